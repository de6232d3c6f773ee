pub mod chatdtos;
pub mod ledgerdtos;
pub mod offerdtos;
