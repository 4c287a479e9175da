pub mod context;
pub mod inbox;
pub mod marketing;
pub mod sales;
pub mod tenant;
pub mod user;
pub mod wizard;
