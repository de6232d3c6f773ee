/// Monetary values are stored as i64 cents everywhere; this is the one
/// place the API converts them to display dollars.
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}
