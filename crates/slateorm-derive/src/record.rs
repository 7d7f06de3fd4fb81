//! Record derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

/// Parsed field-level `#[orm(...)]` attributes.
#[derive(Default)]
struct FieldAttr {
    column: Option<String>,
    alias: Option<String>,
    table: Option<String>,
    skip: bool,
    table_name: bool,
    flatten: bool,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            match ident.to_string().as_str() {
                "skip" => attr.skip = true,
                "table_name" => attr.table_name = true,
                "flatten" => attr.flatten = true,
                key @ ("column" | "alias" | "table") => {
                    let _: syn::Token![=] = input.parse()?;
                    let value: syn::LitStr = input.parse()?;
                    let slot = match key {
                        "column" => &mut attr.column,
                        "alias" => &mut attr.alias,
                        _ => &mut attr.table,
                    };
                    *slot = Some(value.value());
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        &ident,
                        format!("unknown orm attribute `{other}`"),
                    ));
                }
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        if !input.is_empty() {
            return Err(input.error("expected `,` between orm attributes"));
        }
        Ok(attr)
    }
}

fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let parsed: FieldAttr = attr.parse_args()?;
        merged.column = parsed.column.or(merged.column);
        merged.alias = parsed.alias.or(merged.alias);
        merged.table = parsed.table.or(merged.table);
        merged.skip |= parsed.skip;
        merged.table_name |= parsed.table_name;
        merged.flatten |= parsed.flatten;
    }

    if merged.flatten
        && (merged.column.is_some()
            || merged.alias.is_some()
            || merged.table.is_some()
            || merged.skip
            || merged.table_name)
    {
        return Err(syn::Error::new_spanned(
            field,
            "`flatten` cannot be combined with other field attributes",
        ));
    }
    Ok(merged)
}

/// Struct-level `#[orm(table_name = "...")]`.
fn struct_table_name(input: &DeriveInput) -> Result<Option<String>> {
    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested = attr.parse_args::<syn::MetaNameValue>()?;
        if !nested.path.is_ident("table_name") {
            return Err(syn::Error::new_spanned(
                &nested.path,
                "expected `table_name = \"...\"`",
            ));
        }
        if let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(lit),
            ..
        }) = &nested.value
        {
            return Ok(Some(lit.value()));
        }
        return Err(syn::Error::new_spanned(
            &nested.value,
            "table_name must be a string literal",
        ));
    }
    Ok(None)
}

fn opt_str(value: &Option<String>) -> TokenStream {
    match value {
        Some(v) => quote! { ::core::option::Option::Some(#v) },
        None => quote! { ::core::option::Option::None },
    }
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let type_name = name.to_string();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let mut defs = Vec::new();
    let mut assign_arms = Vec::new();
    let mut flatten_arms = Vec::new();

    if let Some(table) = struct_table_name(&input)? {
        defs.push(quote! {
            ::slateorm::FieldDef {
                table_name: true,
                ..::slateorm::FieldDef::new(#table)
            }
        });
    }

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attr_name = ident.to_string();
        let ty = &field.ty;
        let attr = field_attr(field)?;

        if attr.flatten {
            defs.push(quote! {
                ::slateorm::FieldDef {
                    nested: ::core::option::Option::Some(<#ty as ::slateorm::Record>::fields),
                    ..::slateorm::FieldDef::new(#attr_name)
                }
            });
            flatten_arms.push(quote! {
                ::core::option::Option::Some((#attr_name, rest)) => {
                    ::slateorm::Record::assign(&mut self.#ident, rest, cell)
                }
            });
            continue;
        }

        let column = opt_str(&attr.column);
        let alias = opt_str(&attr.alias);
        let table = opt_str(&attr.table);
        let skip = attr.skip;
        let table_name = attr.table_name;
        defs.push(quote! {
            ::slateorm::FieldDef {
                attr: #attr_name,
                column: #column,
                alias: #alias,
                table: #table,
                skip: #skip,
                table_name: #table_name,
                nested: ::core::option::Option::None,
            }
        });

        if !skip && !table_name {
            assign_arms.push(quote! {
                #attr_name => ::core::option::Option::Some(
                    ::slateorm::row::assign_cell(&mut self.#ident, attr, cell)
                ),
            });
        }
    }

    let field_count = defs.len();
    let fallback = if flatten_arms.is_empty() {
        quote! { ::core::option::Option::None }
    } else {
        quote! {
            match attr.split_once('.') {
                #(#flatten_arms)*
                _ => ::core::option::Option::None,
            }
        }
    };

    Ok(quote! {
        impl ::slateorm::Record for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn fields() -> &'static [::slateorm::FieldDef] {
                static FIELDS: [::slateorm::FieldDef; #field_count] = [#(#defs),*];
                &FIELDS
            }

            #[allow(unused_variables)]
            fn assign(
                &mut self,
                attr: &str,
                cell: ::core::option::Option<&[u8]>,
            ) -> ::core::option::Option<::slateorm::OrmResult<()>> {
                match attr {
                    #(#assign_arms)*
                    _ => #fallback,
                }
            }
        }

        ::slateorm::inventory::submit! {
            ::slateorm::RecordRegistration {
                type_name: #type_name,
                register_fn: |registry: &::slateorm::Registry| registry.register::<#name>(),
            }
        }
    })
}
