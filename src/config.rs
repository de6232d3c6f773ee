// config.rs
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    // Lowest offer price a bid may carry, in cents.
    pub min_offer_price: i64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        let min_offer_price = std::env::var("MIN_OFFER_PRICE_CENTS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1000);

        let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:8000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            database_url,
            port,
            min_offer_price,
            allowed_origins,
        }
    }
}
