pub mod health;
pub mod insights;
pub mod reference;
