extern crate proc_macro;

use itertools::izip;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use std::collections::HashSet;
use syn::{parse_macro_input, Attribute, Data, DataEnum, DeriveInput, Fields, LitStr, Type};

/// Field attributes parsed from `#[variant(...)]` annotations
///
/// * `key` - Dictionary key: the `rename` value, or the field name
/// * `skip` - Not written; reads as `Default::default()`
/// * `default` - A missing key reads as `Default::default()`
#[derive(Debug, Clone)]
struct FieldAttributes {
    key: String,
    skip: bool,
    default: bool,
}

/// Parse the `#[variant(...)]` attributes of a field
///
/// Multiple attributes can be combined: `#[variant(rename = "hp", default)]`
fn get_field_attributes(attrs: &[Attribute], field_name: &str) -> syn::Result<FieldAttributes> {
    let mut parsed = FieldAttributes {
        key: field_name.to_owned(),
        skip: false,
        default: false,
    };

    for attr in attrs {
        if !attr.path().is_ident("variant") {
            continue;
        }
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident = input.parse::<syn::Ident>()?;

                if ident == "rename" {
                    input.parse::<syn::Token![=]>()?;
                    let lit_str = input.parse::<LitStr>()?;
                    parsed.key = lit_str.value();
                } else if ident == "skip" {
                    parsed.skip = true;
                } else if ident == "default" {
                    parsed.default = true;
                } else {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("Unknown attribute: {}", ident),
                    ));
                }

                // Consume comma if present, otherwise end
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                }
            }
            Ok(())
        })?;
    }

    Ok(parsed)
}

/// Check if a type is `Option<T>`
///
/// Option fields read a missing key as `None`.
fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .map_or(false, |seg| seg.ident == "Option")
    } else {
        false
    }
}

/// Named fields with their parsed attributes, rejecting duplicate keys
fn named_fields(
    name: &syn::Ident,
    fields: &syn::FieldsNamed,
) -> syn::Result<Vec<(syn::Ident, Type, FieldAttributes)>> {
    let mut used_keys = HashSet::new();
    let mut out = Vec::new();
    for f in &fields.named {
        let Some(ident) = f.ident.clone() else {
            continue;
        };
        let attrs = get_field_attributes(&f.attrs, &ident.to_string())?;
        if !attrs.skip && !used_keys.insert(attrs.key.clone()) {
            return Err(syn::Error::new_spanned(
                f,
                format!(
                    "Dictionary key '{}' is duplicated for struct '{}'. Use #[variant(rename = ...)] on field '{}'.",
                    attrs.key, name, ident
                ),
            ));
        }
        out.push((ident, f.ty.clone(), attrs));
    }
    Ok(out)
}

/// Only enums whose variants carry no data have an index mapping
fn check_unit_enum(name: &syn::Ident, e: &DataEnum) -> syn::Result<()> {
    for v in &e.variants {
        if !matches!(v.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                v,
                format!(
                    "Variant conversion for enum '{}' requires unit variants, '{}' has fields",
                    name, v.ident
                ),
            ));
        }
    }
    Ok(())
}

/// Derive macro for implementing the `ToVariant` trait
///
/// * Structs with named fields become a `Dictionary` keyed by field name
/// * Tuple structs become an `Array`; a single-field tuple struct becomes its field
/// * Enums with only unit variants become their index as an Integer
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(ToVariant)]
/// struct Player {
///     #[variant(rename = "hp")]
///     health: i32,
///     #[variant(skip)]
///     cache: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(ToVariant, attributes(variant))]
pub fn derive_to_variant(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_to_variant(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_to_variant(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => {
                let inserts = named_fields(name, fields)?
                    .into_iter()
                    .filter(|(_, _, attrs)| !attrs.skip)
                    .map(|(ident, _, attrs)| {
                        let key = attrs.key;
                        quote! {
                            dict.insert(#key, ::gd_variant::ToVariant::to_variant(&self.#ident));
                        }
                    });
                quote! {
                    let mut dict = ::gd_variant::Dictionary::new();
                    #(#inserts)*
                    ::gd_variant::Variant::Dictionary(dict)
                }
            }
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => quote! {
                ::gd_variant::ToVariant::to_variant(&self.0)
            },
            Fields::Unnamed(fields) => {
                let items = (0..fields.unnamed.len()).map(|i| {
                    let index = syn::Index::from(i);
                    quote! { ::gd_variant::ToVariant::to_variant(&self.#index) }
                });
                quote! {
                    ::gd_variant::Variant::Array(::gd_variant::Array::from(vec![#(#items),*]))
                }
            }
            Fields::Unit => quote! { ::gd_variant::Variant::Nil },
        },
        Data::Enum(e) => {
            check_unit_enum(name, e)?;
            let arms = e.variants.iter().enumerate().map(|(i, v)| {
                let variant_ident = &v.ident;
                let index = i as i64;
                quote! { #name::#variant_ident => #index, }
            });
            quote! {
                let index: i64 = match self {
                    #(#arms)*
                };
                ::gd_variant::Variant::Int(index)
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "ToVariant cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::gd_variant::ToVariant for #name #ty_generics #where_clause {
            fn to_variant(&self) -> ::gd_variant::Variant {
                #body
            }
        }
    })
}

/// Derive macro for implementing the `FromVariant` trait
///
/// Reads the layouts written by `#[derive(ToVariant)]`. Missing dictionary
/// keys fail with `ConvertError::MissingField` unless the field is an
/// `Option`, is marked `#[variant(default)]`, or is `#[variant(skip)]`.
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(FromVariant)]
/// struct Player {
///     #[variant(rename = "hp")]
///     health: i32,
///     #[variant(default)]
///     level: u32,
/// }
/// ```
#[proc_macro_derive(FromVariant, attributes(variant))]
pub fn derive_from_variant(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_from_variant(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_from_variant(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => {
                let fields = named_fields(name, fields)?;
                let idents: Vec<_> = fields.iter().map(|(ident, _, _)| ident).collect();
                let types: Vec<_> = fields.iter().map(|(_, ty, _)| ty).collect();
                let attrs: Vec<_> = fields.iter().map(|(_, _, attrs)| attrs).collect();

                let reads = izip!(&idents, &types, &attrs).map(|(ident, ty, attrs)| {
                    let key = &attrs.key;
                    if attrs.skip {
                        quote! { let #ident: #ty = ::core::default::Default::default(); }
                    } else if attrs.default || is_option_type(ty) {
                        quote! {
                            let #ident: #ty = match dict.get_str(#key) {
                                Some(value) => ::gd_variant::FromVariant::try_from_variant(value)?,
                                None => ::core::default::Default::default(),
                            };
                        }
                    } else {
                        quote! {
                            let #ident: #ty = ::gd_variant::FromVariant::try_from_variant(
                                dict.get_str(#key).ok_or(::gd_variant::ConvertError::MissingField {
                                    field: #key,
                                    type_name: #type_name,
                                })?,
                            )?;
                        }
                    }
                });
                quote! {
                    let dict: ::gd_variant::Dictionary =
                        ::gd_variant::FromVariant::try_from_variant(variant)?;
                    #(#reads)*
                    Ok(#name { #(#idents),* })
                }
            }
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => quote! {
                Ok(#name(::gd_variant::FromVariant::try_from_variant(variant)?))
            },
            Fields::Unnamed(fields) => {
                let items = (0..fields.unnamed.len()).map(|i| {
                    let position = i.to_string();
                    quote! {
                        ::gd_variant::FromVariant::try_from_variant(
                            array.get(#i).ok_or(::gd_variant::ConvertError::MissingField {
                                field: #position,
                                type_name: #type_name,
                            })?,
                        )?
                    }
                });
                quote! {
                    let array: ::gd_variant::Array =
                        ::gd_variant::FromVariant::try_from_variant(variant)?;
                    Ok(#name(#(#items),*))
                }
            }
            Fields::Unit => quote! {
                let _ = variant;
                Ok(#name)
            },
        },
        Data::Enum(e) => {
            check_unit_enum(name, e)?;
            let arms = e.variants.iter().enumerate().map(|(i, v)| {
                let variant_ident = &v.ident;
                let index = i as i64;
                quote! { #index => Ok(#name::#variant_ident), }
            });
            quote! {
                let index: i64 = ::gd_variant::FromVariant::try_from_variant(variant)?;
                match index {
                    #(#arms)*
                    _ => Err(::gd_variant::ConvertError::OutOfRange {
                        value: index,
                        target: #type_name,
                    }),
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "FromVariant cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::gd_variant::FromVariant for #name #ty_generics #where_clause {
            fn try_from_variant(
                variant: &::gd_variant::Variant,
            ) -> ::core::result::Result<Self, ::gd_variant::ConvertError> {
                #body
            }
        }
    })
}
