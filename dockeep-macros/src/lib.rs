//! Procedural macros for the dockeep project.
//!
//! This crate provides `#[derive(Record)]`, which generates the field tag enumeration
//! the document mapper reads instead of inspecting records at runtime.
//!
//! Fields opt into the two tag namespaces with a `record` attribute:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, Record)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     #[record(filter = "_id", storage = "_id")]
//!     pub id: String,
//!     #[record(filter = "name", storage = "name,omitempty")]
//!     pub name: String,
//!     pub internal: u32,
//! }
//! ```
//!
//! Every named field is enumerated, tagged or not, in declaration order.

#[allow(unused_extern_crates)]
extern crate self as dockeep_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input, ext::IdentExt,
    spanned::Spanned,
};

#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct RecordFieldOptions {
    filter: Option<LitStr>,
    storage: Option<LitStr>,
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new(
                    name.span(),
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "Record can only be derived for structs",
            ));
        }
    };

    let mut tags = Vec::new();
    let mut values = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new(field.span(), "Record requires named fields"))?;
        let field_name = ident.unraw().to_string();
        let options = parse_record_field_options(&field.attrs)?;

        let filter = options.filter.map(|tag| quote!(.with_filter(#tag)));
        let storage = options.storage.map(|tag| quote!(.with_storage(#tag)));

        tags.push(quote! {
            ::dockeep::record::FieldTag::new(#field_name) #filter #storage
        });
        values.push(quote! {
            ::dockeep::bson::ser::serialize_to_bson(&self.#ident)?
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::dockeep::record::Record for #name #ty_generics #where_clause {
            fn field_tags() -> &'static [::dockeep::record::FieldTag] {
                const TAGS: &[::dockeep::record::FieldTag] = &[#(#tags),*];
                TAGS
            }

            fn field_values(
                &self,
            ) -> ::dockeep::error::RecordStoreResult<::std::vec::Vec<::dockeep::bson::Bson>> {
                ::std::result::Result::Ok(::std::vec![#(#values),*])
            }
        }
    })
}

fn parse_record_field_options(attrs: &[Attribute]) -> syn::Result<RecordFieldOptions> {
    let mut options = RecordFieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("filter") {
                if options.filter.is_some() {
                    return Err(meta.error("Duplicate filter tag"));
                }
                options.filter = Some(meta.value()?.parse()?);
                return Ok(());
            }

            if meta.path.is_ident("storage") {
                if options.storage.is_some() {
                    return Err(meta.error("Duplicate storage tag"));
                }
                options.storage = Some(meta.value()?.parse()?);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported record attribute. Supported: filter = \"...\", storage = \"...\"",
            ))
        })?;
    }

    Ok(options)
}
