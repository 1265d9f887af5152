pub mod prelude;
pub mod sync;
pub mod upstream;
