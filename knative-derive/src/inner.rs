use crate::{
    REQUIRED_VARIANTS,
    error::VerificationError
};
use proc_macro::TokenStream;
use quote::quote;
use syn::{
    spanned::Spanned,
    punctuated::Punctuated,
    token::Comma,
    Variant,
    Error,
    Fields,
    Result,
    Data::Enum,
    DeriveInput,
    Ident
};

fn is_dependent(variant: &Variant) -> bool {
    variant.attrs
        .iter()
        .any(|a| a.path.is_ident("dependent"))
}

fn is_happy(variant: &Variant) -> bool {
    REQUIRED_VARIANTS.contains(&variant.ident.to_string().as_str())
}

fn verify_variants(variants: &Punctuated<Variant, Comma>) -> Result<&Ident> {
    let mut happy = None;

    for v in variants {
        if !matches!(v.fields, Fields::Unit) {
            return Err(VerificationError::FieldsNotSupported(v.ident.to_string()).spanned(v.span()));
        }
        if is_happy(v) {
            // Top level conditions are never dependents
            if is_dependent(v) {
                return Err(VerificationError::NotDependent(v.ident.to_string()).spanned(v.span()));
            }
            if happy.is_some() {
                return Err(VerificationError::OneRequiredVariant.spanned(v.span()));
            }
            happy = Some(&v.ident);
        }
    }

    happy.ok_or_else(|| VerificationError::OneRequiredVariant.into())
}

pub fn inner_derive(ast: DeriveInput) -> Result<TokenStream> {
    let name = &ast.ident;

    let variants = match ast.data {
        Enum(syn::DataEnum { ref variants, .. }) => variants,
        _ => return Err(Error::new(
            ast.span(),
            "ConditionType may only be derived on enums"
        ))
    };

    let happy = verify_variants(variants)?;
    let dependent_variants = variants.iter()
        .filter(|v| is_dependent(v))
        .map(|v| &v.ident);

    let capitalized = variants.iter()
        .filter(|v| !is_happy(v))
        .map(|v| v.ident.clone())
        .collect::<Vec<_>>();
    let lower_case = capitalized.iter()
        .map(|v| Ident::new(&v.to_string().to_lowercase(), v.span()))
        .collect::<Vec<_>>();
    let lower_case_doc = capitalized.iter()
        .map(|c| format!("Returns the `{c}` variant of the [`ConditionType`](::knative_conditions::ConditionType)"));

    let mark = lower_case.iter().map(|l| Ident::new(&format!("mark_{l}"), l.span()));
    let mark_with_reason = lower_case.iter().map(|l| Ident::new(&format!("mark_{l}_with_reason"), l.span()));
    let mark_not = lower_case.iter().map(|l| Ident::new(&format!("mark_not_{l}"), l.span()));
    let mark_doc = capitalized.iter().map(|c| format!("Mark `{c}` true."));
    let mark_with_reason_doc = capitalized.iter().map(|c| format!("Mark `{c}` true with a reason."));
    let mark_not_doc = capitalized.iter().map(|c| format!("Mark `{c}` false."));

    let condition_type_name = Ident::new(&format!("{name}Type"), name.span());
    let condition_type_doc = format!("A [`ConditionType`](::knative_conditions::ConditionType) that implements this trait duck types to [`{name}`].");
    let manager_name = Ident::new(&format!("{name}Manager"), name.span());
    let manager_doc = format!("Allows a status to manage [`{name}`].");

    Ok(quote! {
        #[doc = #condition_type_doc]
        pub trait #condition_type_name: ::knative_conditions::ConditionType {
            #(
                #[doc = #lower_case_doc]
                fn #lower_case() -> Self;
            )*
        }

        #[automatically_derived]
        impl #condition_type_name for #name {
            #(
                #[inline]
                fn #lower_case() -> Self {
                    #name::#capitalized
                }
            )*
        }

        #[automatically_derived]
        impl ::knative_conditions::ConditionType for #name {
            #[inline]
            fn happy() -> Self {
                #name::#happy
            }

            #[allow(unused_mut)]
            fn dependents() -> ::knative_conditions::EnumSet<Self> {
                let mut dependents = ::knative_conditions::EnumSet::new();
                #(dependents.insert(#name::#dependent_variants);)*
                dependents
            }
        }

        #[automatically_derived]
        impl ::std::default::Default for #name {
            fn default() -> Self {
                #name::#happy
            }
        }

        #[automatically_derived]
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::write!(f, "{:?}", self)
            }
        }

        #[doc = #manager_doc]
        pub trait #manager_name<S>: ::knative_conditions::ConditionAccessor<S>
        where S: #condition_type_name {
            #(
                #[doc = #mark_doc]
                fn #mark(&mut self) {
                    self.manager().mark_true(S::#lower_case());
                }

                #[doc = #mark_with_reason_doc]
                fn #mark_with_reason(&mut self, reason: &str, message: Option<String>) {
                    self.manager().mark_true_with_reason(S::#lower_case(), reason, message);
                }

                #[doc = #mark_not_doc]
                fn #mark_not(&mut self, reason: &str, message: Option<String>) {
                    self.manager().mark_false(S::#lower_case(), reason, message);
                }
            )*
        }

        impl<S: #condition_type_name, T: ::knative_conditions::ConditionAccessor<S> + ?Sized> #manager_name<S> for T {}
    }.into())
}
