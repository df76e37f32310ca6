//! Small proc-macros shared across NexusRoom crates: one derive, no
//! reflective magic.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derives `wire_tag(&self) -> &'static str` for a tagged-union enum,
/// mapping each `PascalCase` variant to the `camelCase` string the wire
/// protocol uses for its `type` field (`move`, `castSpell`, `pickupLoot`,
/// ...).
///
/// Only unit and single/multi-field struct variants are supported; the
/// macro never inspects field values, only variant names.
#[proc_macro_derive(WireTag)]
pub fn derive_wire_tag(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data) = &input.data else {
        return syn::Error::new_spanned(&input, "WireTag can only be derived for enums")
            .to_compile_error()
            .into();
    };

    let arms = data.variants.iter().map(|variant| {
        let variant_ident = &variant.ident;
        let tag = to_camel_case(&variant_ident.to_string());
        let pattern = match &variant.fields {
            Fields::Unit => quote! { #name::#variant_ident },
            Fields::Unnamed(_) => quote! { #name::#variant_ident(..) },
            Fields::Named(_) => quote! { #name::#variant_ident { .. } },
        };
        quote! { #pattern => #tag }
    });

    let expanded = quote! {
        impl #name {
            /// The `type` string this variant is encoded/decoded as on the wire.
            #[must_use]
            pub fn wire_tag(&self) -> &'static str {
                match self {
                    #(#arms,)*
                }
            }
        }
    };

    expanded.into()
}

fn to_camel_case(pascal: &str) -> String {
    let mut out = String::with_capacity(pascal.len());
    let mut chars = pascal.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_lowercase());
    }
    out.extend(chars);
    out
}
