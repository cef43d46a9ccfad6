use crate::REQUIRED_VARIANTS;
use proc_macro2::Span;
use syn::Error;
use std::fmt;

pub enum VerificationError {
    NotDependent(String),
    OneRequiredVariant,
    FieldsNotSupported(String),
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VerificationError::*;
        match self {
            NotDependent(s) => write!(f, "{} may not be a dependent", s),
            OneRequiredVariant => write!(
                f,
                "ConditionType must contain exactly one {} variant",
                REQUIRED_VARIANTS.join(" or ")
            ),
            FieldsNotSupported(s) => write!(f, "ConditionType variant {} may not have fields", s),
        }
    }
}

impl VerificationError {
    pub fn spanned(self, span: Span) -> Error {
        Error::new(span, self)
    }
}

impl From<VerificationError> for Error {
    fn from(v: VerificationError) -> Error {
        v.spanned(Span::call_site())
    }
}
