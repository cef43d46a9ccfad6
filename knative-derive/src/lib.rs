//! Derive `ConditionType` on your own enums to declare the condition set of a Knative status.
//!
//! Exactly one variant must be named `Ready` (long-running resources) or `Succeeded` (resources
//! that run to completion). Variants marked `#[dependent]` must all be true for that top-level
//! condition to be true.
//!
//! ```ignore
//! #[derive(ConditionType, EnumSetType, Debug)]
//! enum MyCondition {
//!     Ready,
//!     #[dependent]
//!     SinkProvided,
//! }
//! ```
mod error;
mod inner;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

pub(crate) const REQUIRED_VARIANTS: [&str; 2] = ["Ready", "Succeeded"];

#[proc_macro_derive(ConditionType, attributes(dependent))]
pub fn derive_condition_type(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    inner::inner_derive(ast).unwrap_or_else(|e| e.to_compile_error().into())
}
