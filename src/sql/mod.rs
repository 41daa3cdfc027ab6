pub mod validator;

pub use validator::{validate, UnsafeQuery};
