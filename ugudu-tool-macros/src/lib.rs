//! `#[ugudu_tool]`: derive a [`ugudu_tool::Tool`] implementation from a
//! plain async function.
//!
//! ```ignore
//! #[ugudu_tool(name = "echo", description = "Echo text back")]
//! async fn echo(
//!     /// The text to echo
//!     text: String,
//!     _ctx: &ToolContext,
//! ) -> Result<EchoOutput, EchoError> {
//!     Ok(EchoOutput { echoed: text })
//! }
//! ```
//!
//! Generates an `EchoArgs` struct (one field per non-context parameter,
//! carrying its doc comment as the schema description) and an `EchoTool`
//! unit struct implementing `Tool`. The last parameter is always treated
//! as the `&ToolContext` the loop passes in and is excluded from `Args`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{FnArg, Ident, ItemFn, Pat, ReturnType, Type, parse_macro_input};

struct ToolAttrs {
    name: String,
    description: String,
}

impl syn::parse::Parse for ToolAttrs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let mut description = None;
        let pairs = syn::punctuated::Punctuated::<syn::MetaNameValue, syn::Token![,]>::parse_terminated(input)?;
        for pair in pairs {
            let key = pair.path.get_ident().map(Ident::to_string).unwrap_or_default();
            let value = match &pair.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => s.value(),
                other => {
                    return Err(syn::Error::new_spanned(other, "expected a string literal"));
                }
            };
            match key.as_str() {
                "name" => name = Some(value),
                "description" => description = Some(value),
                _ => return Err(syn::Error::new_spanned(pair.path, "unknown attribute key")),
            }
        }
        Ok(ToolAttrs {
            name: name.ok_or_else(|| {
                syn::Error::new(proc_macro2::Span::call_site(), "missing `name = \"...\"`")
            })?,
            description: description.ok_or_else(|| {
                syn::Error::new(
                    proc_macro2::Span::call_site(),
                    "missing `description = \"...\"`",
                )
            })?,
        })
    }
}

#[proc_macro_attribute]
pub fn ugudu_tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = parse_macro_input!(attr as ToolAttrs);
    let func = parse_macro_input!(item as ItemFn);

    match expand(attrs, func) {
        Ok(ts) => ts.into(),
        Err(e) => e.into_compile_error().into(),
    }
}

fn expand(attrs: ToolAttrs, func: ItemFn) -> syn::Result<TokenStream2> {
    let fn_name = &func.sig.ident;
    let pascal = to_pascal_case(&fn_name.to_string());
    let args_ident = format_ident!("{pascal}Args");
    let tool_ident = format_ident!("{pascal}Tool");

    let mut inputs: Vec<(Ident, Box<Type>, Option<String>)> = Vec::new();
    for input in &func.sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new_spanned(
                input,
                "ugudu_tool functions may not take `self`",
            ));
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_type.pat,
                "ugudu_tool arguments must be simple identifiers",
            ));
        };
        let doc = pat_type.attrs.iter().find_map(doc_comment);
        inputs.push((pat_ident.ident.clone(), pat_type.ty.clone(), doc));
    }

    // The last parameter is always the ToolContext; everything else
    // becomes a field on the generated Args struct.
    let ctx_arg = inputs
        .pop()
        .ok_or_else(|| syn::Error::new_spanned(&func.sig, "expected a trailing &ToolContext parameter"))?;
    let ctx_ident = ctx_arg.0;

    let (output_ty, error_ty) = extract_result_types(&func.sig.output)?;

    let field_defs: Vec<TokenStream2> = inputs
        .iter()
        .map(|(ident, ty, doc)| {
            let doc_attr = doc.as_ref().map(|d| quote! { #[doc = #d] });
            quote! {
                #doc_attr
                pub #ident: #ty
            }
        })
        .collect();
    let field_idents: Vec<&Ident> = inputs.iter().map(|(ident, _, _)| ident).collect();

    let name = &attrs.name;
    let description = &attrs.description;
    let block = &func.block;

    Ok(quote! {
        #[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
        pub struct #args_ident {
            #(#field_defs),*
        }

        #[derive(Debug, Clone, Copy)]
        pub struct #tool_ident;

        impl ugudu_tool::Tool for #tool_ident {
            const NAME: &'static str = #name;
            type Args = #args_ident;
            type Output = #output_ty;
            type Error = #error_ty;

            fn definition(&self) -> ugudu_types::ToolDefinition {
                ugudu_types::ToolDefinition {
                    name: <Self as ugudu_tool::Tool>::NAME.into(),
                    title: None,
                    description: #description.into(),
                    input_schema: serde_json::to_value(schemars::schema_for!(#args_ident))
                        .expect("tool arg schema serializes"),
                    output_schema: None,
                    annotations: None,
                    cache_control: None,
                }
            }

            fn call(
                &self,
                args: Self::Args,
                #ctx_ident: &ugudu_types::ToolContext,
            ) -> impl ::std::future::Future<Output = Result<Self::Output, Self::Error>> + Send {
                async move {
                    let #args_ident { #(#field_idents),* } = args;
                    #block
                }
            }
        }
    })
}

fn doc_comment(attr: &syn::Attribute) -> Option<String> {
    if !attr.path().is_ident("doc") {
        return None;
    }
    let syn::Meta::NameValue(nv) = &attr.meta else {
        return None;
    };
    match &nv.value {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(s),
            ..
        }) => Some(s.value().trim().to_string()),
        _ => None,
    }
}

fn extract_result_types(ret: &ReturnType) -> syn::Result<(TokenStream2, TokenStream2)> {
    let ReturnType::Type(_, ty) = ret else {
        return Err(syn::Error::new_spanned(
            ret,
            "ugudu_tool functions must return Result<Output, Error>",
        ));
    };
    let Type::Path(type_path) = ty.as_ref() else {
        return Err(syn::Error::new_spanned(ty, "expected Result<Output, Error>"));
    };
    let segment = type_path
        .path
        .segments
        .last()
        .ok_or_else(|| syn::Error::new_spanned(type_path, "expected Result<Output, Error>"))?;
    if segment.ident != "Result" {
        return Err(syn::Error::new_spanned(
            &segment.ident,
            "ugudu_tool functions must return Result<Output, Error>",
        ));
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return Err(syn::Error::new_spanned(segment, "expected Result<Output, Error>"));
    };
    let mut generics = args.args.iter();
    let output = generics
        .next()
        .ok_or_else(|| syn::Error::new_spanned(args, "missing Result Output type"))?;
    let error = generics
        .next()
        .ok_or_else(|| syn::Error::new_spanned(args, "missing Result Error type"))?;
    Ok((output.to_token_stream(), error.to_token_stream()))
}

fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
