pub mod dry_run;
pub mod generate;
pub mod request;

pub use dry_run::dry_run;
pub use generate::generate;
pub use request::request;
