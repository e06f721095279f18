//! Derive per-type field descriptor tables for `multisave`.
//!
//! `#[derive(SaveFields)]` on a struct with named fields generates:
//!
//! - a `FieldTable` impl whose descriptor table (`name`, `kind`, `save`) is
//!   built once per type,
//! - a `FieldSet` impl that reads and writes fields by name through
//!   `FieldValue`,
//! - a `SaveValue` impl so the struct can itself be used as a structured
//!   field inside another `SaveFields` type.
//!
//! # Usage
//!
//! ```ignore
//! use multisave::SaveFields;
//!
//! #[derive(SaveFields, Default)]
//! struct Inventory {
//!     #[save]
//!     gold: u32,
//!     #[save]
//!     slots: Vec<Slot>,
//!     // not persisted unless a parent structure selects `Inventory` wholesale
//!     cached_weight: f32,
//! }
//! ```
//!
//! Every field type must implement `multisave::SaveValue` and `Default`
//! (missing entries in a saved structure fall back to the default).

#![allow(clippy::needless_pass_by_value)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DataStruct, DeriveInput, Fields, LitStr};

/// Name of the field attribute that marks a field eligible for persistence.
const SAVE_ATTR: &str = "save";

struct FieldSpec {
    ident: syn::Ident,
    ty: syn::Type,
    name: LitStr,
    save: bool,
}

/// Derive `FieldTable`, `FieldSet` and `SaveValue` for a struct.
///
/// Generic structs and tuple structs are rejected with a compile error.
#[proc_macro_derive(SaveFields, attributes(save))]
pub fn derive_save_fields(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let expanded = match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    };
    TokenStream::from(expanded)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "SaveFields cannot be derived for generic types",
        ));
    }

    let named = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(named),
            ..
        }) => &named.named,
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "SaveFields can only be derived for structs with named fields",
            ))
        }
    };

    let fields = named
        .iter()
        .map(|field| {
            // Named fields always carry an ident.
            let field_ident = field
                .ident
                .clone()
                .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
            let name = LitStr::new(&field_ident.to_string(), field_ident.span());
            let save = field.attrs.iter().any(|a| a.path().is_ident(SAVE_ATTR));
            Ok(FieldSpec {
                ident: field_ident,
                ty: field.ty.clone(),
                name,
                save,
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    let descriptors = fields.iter().map(|f| {
        let FieldSpec { ty, name, save, .. } = f;
        quote! {
            ::multisave::FieldDescriptor {
                name: #name,
                kind: <#ty as ::multisave::SaveValue>::kind(),
                save: #save,
            }
        }
    });

    let getters = fields.iter().map(|f| {
        let FieldSpec { ident, name, .. } = f;
        quote! {
            #name => ::std::option::Option::Some(::multisave::SaveValue::to_value(&self.#ident)),
        }
    });

    let setters = fields.iter().map(|f| {
        let FieldSpec {
            ident, ty, name, ..
        } = f;
        quote! {
            #name => match <#ty as ::multisave::SaveValue>::from_value(value) {
                ::std::option::Option::Some(v) => {
                    self.#ident = v;
                    true
                }
                ::std::option::Option::None => false,
            },
        }
    });

    let to_entries = fields.iter().map(|f| {
        let FieldSpec { ident, name, .. } = f;
        quote! {
            (::std::string::String::from(#name), ::multisave::SaveValue::to_value(&self.#ident)),
        }
    });

    let from_entries = fields.iter().map(|f| {
        let FieldSpec {
            ident, ty, name, ..
        } = f;
        quote! {
            #ident: fields
                .take(#name)
                .and_then(<#ty as ::multisave::SaveValue>::from_value)
                .unwrap_or_default(),
        }
    });

    Ok(quote! {
        impl ::multisave::FieldTable for #ident {
            const TYPE_NAME: &'static str = concat!(module_path!(), "::", stringify!(#ident));

            fn table() -> &'static [::multisave::FieldDescriptor] {
                static TABLE: ::std::sync::OnceLock<::std::vec::Vec<::multisave::FieldDescriptor>> =
                    ::std::sync::OnceLock::new();
                TABLE.get_or_init(|| ::std::vec![#(#descriptors),*])
            }
        }

        impl ::multisave::FieldSet for #ident {
            fn type_name(&self) -> &'static str {
                <Self as ::multisave::FieldTable>::TYPE_NAME
            }

            fn field_table(&self) -> &'static [::multisave::FieldDescriptor] {
                <Self as ::multisave::FieldTable>::table()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn get_field(&self, name: &str) -> ::std::option::Option<::multisave::FieldValue> {
                match name {
                    #(#getters)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_field(&mut self, name: &str, value: ::multisave::FieldValue) -> bool {
                match name {
                    #(#setters)*
                    _ => false,
                }
            }
        }

        impl ::multisave::SaveValue for #ident {
            fn kind() -> ::multisave::FieldKind {
                ::multisave::FieldKind::Struct(::multisave::StructType::of::<Self>())
            }

            fn to_value(&self) -> ::multisave::FieldValue {
                ::multisave::FieldValue::Struct(::multisave::StructValue::from_entries(::std::vec![
                    #(#to_entries)*
                ]))
            }

            fn from_value(value: ::multisave::FieldValue) -> ::std::option::Option<Self> {
                let ::multisave::FieldValue::Struct(mut fields) = value else {
                    return ::std::option::Option::None;
                };
                ::std::option::Option::Some(Self {
                    #(#from_entries)*
                })
            }
        }
    })
}
