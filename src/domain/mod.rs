pub mod constants;
pub mod crypto;
pub mod cursor;
pub mod fat;
pub mod pe;
pub mod signature;
pub mod verification;
