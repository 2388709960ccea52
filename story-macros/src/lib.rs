//! Proc macros for structured story generation.
//!
//! Provides `#[derive(ResponseSchema)]` to build the JSON schema the
//! generation endpoint uses to constrain its output to a struct's shape.
//!
//! # Example
//!
//! ```ignore
//! /// A generated story premise
//! #[derive(ResponseSchema, Deserialize)]
//! struct Premise {
//!     /// Short, evocative title
//!     title: String,
//!     /// Optional list of genre tags
//!     tags: Option<Vec<String>>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Field, Lit, Meta, Type};

/// Derive macro for generating `response_schema()`.
///
/// # Attributes
///
/// - `#[schema(rename = "...")]` on fields - Override field name in schema
/// - `#[schema(optional)]` on fields - Leave the field out of `required`
///
/// Field types map to schema types: strings, integers, floats, bools,
/// `Vec<T>` and `Option<T>` (nullable, not required). Any other type is
/// treated as a nested struct and must itself derive `ResponseSchema`.
#[proc_macro_derive(ResponseSchema, attributes(schema))]
pub fn derive_response_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_schema(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand_schema(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let description = get_doc_comment(&input.attrs);

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "ResponseSchema derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "ResponseSchema derive only supports structs",
            ))
        }
    };

    let mut property_tokens = Vec::new();
    let mut field_names = Vec::new();
    let mut required_fields = Vec::new();

    for field in fields {
        let field_name_str = get_field_name(field)?;
        let field_desc = get_doc_comment(&field.attrs);
        let field_type = &field.ty;
        let type_schema = type_to_schema(field_type)?;

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        let nullable_token = if is_option_type(field_type) {
            quote! { property["nullable"] = serde_json::json!(true); }
        } else {
            quote! {}
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                #nullable_token
                properties.insert(#field_name_str.to_string(), property);
            }
        });

        if !is_field_optional(field) && !is_option_type(field_type) {
            required_fields.push(field_name_str.clone());
        }
        field_names.push(field_name_str);
    }

    let desc_token = if description.is_empty() {
        quote! {}
    } else {
        quote! { schema["description"] = serde_json::json!(#description); }
    };

    Ok(quote! {
        impl #struct_name {
            /// Generate the response schema for this type.
            pub fn response_schema() -> serde_json::Value {
                let mut properties = serde_json::Map::new();
                #(#property_tokens)*

                let required: Vec<&str> = vec![#(#required_fields),*];
                let ordering: Vec<&str> = vec![#(#field_names),*];

                let mut schema = serde_json::json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "required": required,
                    "propertyOrdering": ordering
                });
                #desc_token
                schema
            }
        }
    })
}

fn get_field_name(field: &Field) -> syn::Result<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("schema") {
            if let Ok(Meta::NameValue(nv)) = attr.parse_args::<Meta>() {
                if nv.path.is_ident("rename") {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            return Ok(s.value());
                        }
                    }
                }
            }
        }
    }

    field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))
}

fn is_field_optional(field: &Field) -> bool {
    field.attrs.iter().any(|attr| {
        attr.path().is_ident("schema")
            && matches!(attr.parse_args::<Meta>(), Ok(Meta::Path(path)) if path.is_ident("optional"))
    })
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn type_to_schema(ty: &Type) -> syn::Result<TokenStream2> {
    let Type::Path(type_path) = ty else {
        return Err(syn::Error::new_spanned(ty, "unsupported field type"));
    };
    let Some(segment) = type_path.path.segments.last() else {
        return Err(syn::Error::new_spanned(ty, "unsupported field type"));
    };

    Ok(match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!({"type": "STRING"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "INTEGER"}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "NUMBER"}) },
        "bool" => quote! { serde_json::json!({"type": "BOOLEAN"}) },
        "Option" => match first_generic(segment) {
            Some(inner) => type_to_schema(inner)?,
            None => return Err(syn::Error::new_spanned(ty, "Option without a type argument")),
        },
        "Vec" => match first_generic(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner)?;
                quote! {
                    serde_json::json!({
                        "type": "ARRAY",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { serde_json::json!({"type": "ARRAY"}) },
        },
        // Nested struct
        _ => quote! { <#ty>::response_schema() },
    })
}
