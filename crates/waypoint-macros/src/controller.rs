use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, LitBool, LitStr, Meta, Pat, Token,
    Type, punctuated::Punctuated, spanned::Spanned,
};

// ─── Parsed model ────────────────────────────────────────────────────────────

enum MappingKind {
    Message,
    Subscribe,
}

struct MethodMapping {
    kind: MappingKind,
    patterns: Vec<LitStr>,
    send_to: Option<LitStr>,
}

/// How one parameter is bound, from its attribute (or lack of one).
enum Binding {
    Header {
        name: LitStr,
        default_value: Option<LitStr>,
        required: Option<LitBool>,
    },
    Headers,
    PathVariable {
        name: LitStr,
    },
    Payload {
        required: Option<LitBool>,
    },
    Inferred,
}

struct Param {
    ident: Ident,
    name: LitStr,
    ty: Type,
    binding: Binding,
}

const PARAM_ATTRS: &[&str] = &["header", "headers", "path_variable", "payload"];

// ============================================================================
// Entry point
// ============================================================================

pub fn expand(attr: TokenStream, mut item: ItemImpl) -> syn::Result<TokenStream> {
    let args = parse_controller_args(attr)?;
    let krate = &args.krate;

    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new(
            path.span(),
            "#[controller] must be placed on an inherent impl block",
        ));
    }

    let mut methods = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let Some(mapping) = take_mapping(&mut method.attrs)? else {
            continue;
        };
        let params = take_params(method)?;
        methods.push(generate_method(
            &item.self_ty,
            method,
            &mapping,
            &params,
            &args,
        ));
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics #krate::Controller for #self_ty #where_clause {
            fn handler_methods(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::vec::Vec<#krate::HandlerMethod> {
                ::std::vec![#(#methods),*]
            }
        }
    })
}

// ============================================================================
// Attribute parsing
// ============================================================================

struct ControllerArgs {
    prefix: Option<LitStr>,
    /// Path the generated code uses to reach the framework.
    krate: syn::Path,
}

fn parse_controller_args(attr: TokenStream) -> syn::Result<ControllerArgs> {
    let mut prefix = None;
    let mut krate = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("prefix") {
            prefix = Some(meta.value()?.parse::<LitStr>()?);
            Ok(())
        } else if meta.path.is_ident("crate") {
            krate = Some(meta.value()?.parse::<LitStr>()?.parse::<syn::Path>()?);
            Ok(())
        } else {
            Err(meta.error(
                "unsupported controller argument; expected `prefix = \"…\"` or `crate = \"…\"`",
            ))
        }
    });
    syn::parse::Parser::parse2(parser, attr)?;
    Ok(ControllerArgs {
        prefix,
        krate: krate.unwrap_or_else(|| syn::parse_quote!(::waypoint::framework)),
    })
}

/// Removes the mapping attributes from a method and returns what they declare.
fn take_mapping(attrs: &mut Vec<Attribute>) -> syn::Result<Option<MethodMapping>> {
    let mut mapping: Option<(MappingKind, Vec<LitStr>)> = None;
    let mut send_to = None;
    let mut send_to_span = None;

    for attr in attrs.iter() {
        let kind = if attr.path().is_ident("message_mapping") {
            MappingKind::Message
        } else if attr.path().is_ident("subscribe_mapping") {
            MappingKind::Subscribe
        } else if attr.path().is_ident("send_to") {
            send_to = Some(attr.parse_args::<LitStr>()?);
            send_to_span = Some(attr.span());
            continue;
        } else {
            continue;
        };

        if mapping.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "a method may declare only one of #[message_mapping] or #[subscribe_mapping]",
            ));
        }

        let patterns = match &attr.meta {
            Meta::Path(_) => Vec::new(),
            _ => attr
                .parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?
                .into_iter()
                .collect(),
        };
        mapping = Some((kind, patterns));
    }

    attrs.retain(|a| {
        !(a.path().is_ident("message_mapping")
            || a.path().is_ident("subscribe_mapping")
            || a.path().is_ident("send_to"))
    });

    match (mapping, send_to_span) {
        (Some((kind, patterns)), _) => Ok(Some(MethodMapping {
            kind,
            patterns,
            send_to,
        })),
        (None, Some(span)) => Err(syn::Error::new(
            span,
            "#[send_to] requires #[message_mapping] or #[subscribe_mapping]",
        )),
        (None, None) => Ok(None),
    }
}

/// Validates the signature and strips parameter attributes.
fn take_params(method: &mut ImplItemFn) -> syn::Result<Vec<Param>> {
    let sig = &mut method.sig;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "handler methods must be synchronous",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "handler methods cannot be generic",
        ));
    }
    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new(
                sig.ident.span(),
                "handler methods must take `&self`",
            ));
        }
    }

    let mut params = Vec::new();
    for (index, input) in sig.inputs.iter_mut().enumerate() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };

        if let Type::Reference(reference) = &*pat_type.ty {
            return Err(syn::Error::new(
                reference.span(),
                "handler parameters must be owned types",
            ));
        }

        let name = match &*pat_type.pat {
            Pat::Ident(pat) => pat.ident.to_string(),
            _ => format!("arg{index}"),
        };
        let name = LitStr::new(&name, pat_type.pat.span());

        let binding = parse_binding(&pat_type.attrs, &name)?;
        pat_type.attrs.retain(|a| {
            !PARAM_ATTRS.iter().any(|known| a.path().is_ident(known))
        });

        params.push(Param {
            ident: format_ident!("__arg{}", params.len()),
            name,
            ty: (*pat_type.ty).clone(),
            binding,
        });
    }

    Ok(params)
}

fn parse_binding(attrs: &[Attribute], param_name: &LitStr) -> syn::Result<Binding> {
    let mut binding = None;

    for attr in attrs {
        let parsed = if attr.path().is_ident("header") {
            parse_header(attr, param_name)?
        } else if attr.path().is_ident("headers") {
            Binding::Headers
        } else if attr.path().is_ident("path_variable") {
            let name = match &attr.meta {
                Meta::Path(_) => param_name.clone(),
                _ => attr.parse_args::<LitStr>()?,
            };
            Binding::PathVariable { name }
        } else if attr.path().is_ident("payload") {
            let mut required = None;
            if !matches!(attr.meta, Meta::Path(_)) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("required") {
                        required = Some(meta.value()?.parse::<LitBool>()?);
                        Ok(())
                    } else {
                        Err(meta.error("expected `required = …`"))
                    }
                })?;
            }
            Binding::Payload { required }
        } else {
            continue;
        };

        if binding.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "a parameter may carry only one binding attribute",
            ));
        }
        binding = Some(parsed);
    }

    Ok(binding.unwrap_or(Binding::Inferred))
}

/// `#[header]`, `#[header("name")]` or
/// `#[header(name = "…", default = "…", required = false)]`.
fn parse_header(attr: &Attribute, param_name: &LitStr) -> syn::Result<Binding> {
    let mut name = param_name.clone();
    let mut default_value = None;
    let mut required = None;

    match &attr.meta {
        Meta::Path(_) => {}
        _ => {
            if let Ok(lit) = attr.parse_args::<LitStr>() {
                name = lit;
            } else {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        name = meta.value()?.parse()?;
                    } else if meta.path.is_ident("default") {
                        default_value = Some(meta.value()?.parse()?);
                    } else if meta.path.is_ident("required") {
                        required = Some(meta.value()?.parse()?);
                    } else {
                        return Err(meta.error("expected `name`, `default` or `required`"));
                    }
                    Ok(())
                })?;
            }
        }
    }

    Ok(Binding::Header {
        name,
        default_value,
        required,
    })
}

// ============================================================================
// Code generation
// ============================================================================

fn descriptor(krate: &syn::Path, param: &Param) -> TokenStream {
    let ty = &param.ty;
    let name = &param.name;
    let desc = quote! { #krate::ParameterDescriptor };

    match &param.binding {
        Binding::Header {
            name: header,
            default_value,
            required,
        } => {
            let default_value = default_value.as_ref().map(|d| quote! { .default_value(#d) });
            let required = required.as_ref().map(|r| quote! { .required(#r) });
            quote! {
                #desc::header::<#ty>(#header).named(#name) #default_value #required
            }
        }
        Binding::Headers => quote! { #desc::headers::<#ty>().named(#name) },
        Binding::PathVariable { name: variable } => quote! {
            #desc::path_variable::<#ty>(#variable).named(#name)
        },
        Binding::Payload { required } => {
            let required = required.as_ref().map(|r| quote! { .required(#r) });
            quote! { #desc::payload::<#ty>().named(#name) #required }
        }
        Binding::Inferred => quote! { #desc::inferred::<#ty>(#name) },
    }
}

fn generate_method(
    self_ty: &Type,
    method: &ImplItemFn,
    mapping: &MethodMapping,
    params: &[Param],
    controller: &ControllerArgs,
) -> TokenStream {
    let krate = &controller.krate;
    let fn_name = &method.sig.ident;
    let patterns = &mapping.patterns;
    let count = patterns.len();

    let mapping_call = match mapping.kind {
        MappingKind::Message => quote! { message_mapping },
        MappingKind::Subscribe => quote! { subscribe_mapping },
    };
    let prefix_call = controller.prefix.as_ref().map(|p| quote! { .prefix(#p) });
    let send_to_call = mapping.send_to.as_ref().map(|d| quote! { .send_to(#d) });
    let descriptors = params.iter().map(|p| descriptor(krate, p));

    let idents: Vec<_> = params.iter().map(|p| &p.ident).collect();
    let types = params.iter().map(|p| &p.ty);
    let indices = 0..params.len();
    let args = if params.is_empty() {
        quote! { _args }
    } else {
        quote! { mut args }
    };

    quote! {
        {
            let this = ::std::sync::Arc::clone(&self);
            #krate::HandlerMethod::builder(
                ::std::concat!(::std::stringify!(#self_ty), "::", ::std::stringify!(#fn_name)),
            )
            #prefix_call
            .#mapping_call::<[&'static str; #count], &'static str>([#(#patterns),*])
            #send_to_call
            #(.param(#descriptors))*
            .handler(move |#args: #krate::Arguments|
                -> ::std::result::Result<_, #krate::InvokeError> {
                #(let #idents = args.take::<#types>(#indices)?;)*
                ::std::result::Result::Ok(this.#fn_name(#(#idents),*))
            })
        }
    }
}
