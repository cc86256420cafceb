use heck::ToKebabCase;
use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned, ToTokens};
use syn::ext::IdentExt;
use syn::spanned::Spanned;

/// The verb markers, and the `Verb` variant each stands for.
const VERBS: &[(&str, &str)] = &[
    ("get", "Get"),
    ("post", "Post"),
    ("put", "Put"),
    ("delete", "Delete"),
    ("options", "Options"),
    ("head", "Head"),
    ("patch", "Patch"),
];

pub(super) fn controller(
    args: syn::AttributeArgs,
    mut input: syn::ItemImpl,
) -> Result<TokenStream, syn::Error> {
    if let Some((_, ref path, _)) = input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[controller] expects an inherent impl block",
        ));
    }

    let class_path = parse_class_path(&args)?;
    let name = type_name(&input.self_ty)?;

    let mut methods = vec![];
    for item in input.items.iter_mut() {
        if let syn::ImplItem::Method(method) = item {
            if let Some(method) = ControllerMethod::take(method)? {
                methods.push(method);
            }
        }
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let class_path = option_lit(class_path.as_ref());
    let method_metadata = methods.iter().map(ControllerMethod::metadata);
    let arms = methods
        .iter()
        .filter(|m| m.route)
        .map(|m| m.dispatch(self_ty));

    Ok(quote! {
        #input

        #[automatically_derived]
        impl #impl_generics ::proteus::Controller for #self_ty #where_clause {
            fn metadata() -> &'static ::proteus::metadata::ControllerMetadata {
                static METADATA: ::proteus::metadata::ControllerMetadata =
                    ::proteus::metadata::ControllerMetadata {
                        name: #name,
                        path: #class_path,
                        methods: &[#(#method_metadata),*],
                    };
                &METADATA
            }

            #[allow(clippy::let_unit_value, clippy::unit_arg)]
            fn invoke<'__a>(
                self: ::std::sync::Arc<Self>,
                __method: &'static str,
                __exchange: &'__a mut ::proteus::Exchange,
            ) -> ::proteus::handler::BoxFuture<
                '__a,
                ::core::result::Result<::proteus::Reply, ::proteus::HandlerError>,
            > {
                ::std::boxed::Box::pin(async move {
                    match __method {
                        #(#arms)*
                        __other => ::core::result::Result::Err(
                            ::proteus::handler::unknown_method(#name, __other),
                        ),
                    }
                })
            }
        }
    })
}

fn parse_class_path(args: &[syn::NestedMeta]) -> Result<Option<syn::LitStr>, syn::Error> {
    let mut path = None;
    for arg in args {
        match arg {
            syn::NestedMeta::Lit(lit) => path = Some(lit_str(lit)?.clone()),
            syn::NestedMeta::Meta(syn::Meta::NameValue(nv)) if nv.path.is_ident("path") => {
                path = Some(lit_str(&nv.lit)?.clone());
            }
            v => {
                return Err(syn::Error::new_spanned(
                    v,
                    "expected #[controller(path = \"...\")]",
                ))
            }
        }
    }
    Ok(path)
}

/// One `pub` method of the controller.
struct ControllerMethod {
    ident: syn::Ident,
    verbs: Vec<syn::Ident>,
    path: Option<syn::LitStr>,
    asyncness: bool,
    parameters: Vec<Parameter>,
    output: Option<syn::Type>,
    route: bool,
}

impl ControllerMethod {
    /// Reads the markers off the method, and strips them.  Methods that are
    /// not `pub` are not recorded.
    fn take(method: &mut syn::ImplItemMethod) -> Result<Option<Self>, syn::Error> {
        let mut verbs = vec![];
        let mut path = None;
        let mut kept = Vec::with_capacity(method.attrs.len());

        for attr in std::mem::take(&mut method.attrs) {
            if let Some(verb) = verb_of(&attr)? {
                verbs.push(verb);
            } else if attr.path.is_ident("path") {
                if path.is_some() {
                    return Err(syn::Error::new_spanned(attr, "duplicate #[path] marker"));
                }
                path = Some(parse_path(&attr)?);
            } else {
                kept.push(attr);
            }
        }
        method.attrs = kept;

        let route = !verbs.is_empty();
        let is_pub = matches!(method.vis, syn::Visibility::Public(_));
        if !is_pub && (route || path.is_some()) {
            return Err(syn::Error::new_spanned(
                &method.sig.ident,
                "route methods must be `pub`",
            ));
        }

        let mut parameters = vec![];
        if route {
            match method.sig.inputs.first() {
                Some(syn::FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none() => {}
                _ => {
                    return Err(syn::Error::new_spanned(
                        &method.sig,
                        "route methods must take `&self`",
                    ))
                }
            }
            if !method.sig.generics.params.is_empty() {
                return Err(syn::Error::new_spanned(
                    &method.sig.generics,
                    "route methods cannot be generic",
                ));
            }

            for input in method.sig.inputs.iter_mut() {
                if let syn::FnArg::Typed(pat) = input {
                    parameters.push(Parameter::take(pat)?);
                }
            }
        } else {
            for input in method.sig.inputs.iter_mut() {
                if let syn::FnArg::Typed(pat) = input {
                    if take_marker(&mut pat.attrs)?.is_some() {
                        return Err(syn::Error::new_spanned(
                            pat,
                            "parameter markers are only allowed on route methods",
                        ));
                    }
                }
            }
        }

        if !is_pub {
            return Ok(None);
        }

        let output = match method.sig.output {
            syn::ReturnType::Default => None,
            syn::ReturnType::Type(_, ref ty) => Some((**ty).clone()),
        };

        Ok(Some(ControllerMethod {
            ident: method.sig.ident.clone(),
            verbs,
            path,
            asyncness: method.sig.asyncness.is_some(),
            parameters,
            output,
            route,
        }))
    }

    fn metadata(&self) -> TokenStream {
        let name = self.ident.unraw().to_string();
        let verbs = &self.verbs;
        let path = option_lit(self.path.as_ref());
        let parameters = self.parameters.iter().map(Parameter::spec);

        quote! {
            ::proteus::metadata::MethodMetadata {
                name: #name,
                verbs: &[#(::proteus::metadata::Verb::#verbs),*],
                path: #path,
                parameters: &[#(#parameters),*],
            }
        }
    }

    fn dispatch(&self, self_ty: &syn::Type) -> TokenStream {
        let name = self.ident.unraw().to_string();
        let ident = &self.ident;
        let locals = (0..self.parameters.len())
            .map(|i| syn::Ident::new(&format!("__arg{}", i), Span::call_site()))
            .collect::<Vec<_>>();
        let bindings = self
            .parameters
            .iter()
            .zip(&locals)
            .filter_map(|(p, local)| p.binding(local));
        let arguments = self
            .parameters
            .iter()
            .zip(&locals)
            .map(|(p, local)| p.argument(local));
        let call = if self.asyncness {
            quote!(<#self_ty>::#ident(&*self, #(#arguments),*).await)
        } else {
            quote!(<#self_ty>::#ident(&*self, #(#arguments),*))
        };
        let reply = reply(self.output.as_ref(), quote!(__output));

        quote! {
            #name => {
                #(#bindings)*
                let __output = #call;
                #reply
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Path,
    Query,
    Header,
    FormFile,
}

struct Marker {
    source: Source,
    name: Option<String>,
    default: Option<syn::LitStr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Param(&'static str),
    Body,
    FormFile,
    Exchange { mutable: bool },
}

impl Kind {
    fn source(self) -> &'static str {
        match self {
            Kind::Param(source) => source,
            Kind::Body => "Body",
            Kind::FormFile => "FormFile",
            Kind::Exchange { .. } => "Exchange",
        }
    }
}

/// One parameter of a route method.
struct Parameter {
    name: String,
    kind: Kind,
    ty: syn::Type,
    inner: syn::Type,
    required: bool,
    default: Option<syn::LitStr>,
    span: Span,
}

impl Parameter {
    fn take(pat: &mut syn::PatType) -> Result<Self, syn::Error> {
        let marker = take_marker(&mut pat.attrs)?;
        let ident = match &*pat.pat {
            syn::Pat::Ident(p) => Some(p.ident.unraw().to_string()),
            _ => None,
        };
        let (inner, required) = match option_inner(&pat.ty) {
            Some(inner) => (inner.clone(), false),
            None => ((*pat.ty).clone(), true),
        };

        let kind = match marker.as_ref().map(|m| m.source) {
            Some(Source::Path) => Kind::Param("Path"),
            Some(Source::Query) => Kind::Param("Query"),
            Some(Source::Header) => Kind::Param("Header"),
            Some(Source::FormFile) => Kind::FormFile,
            None => match exchange_ref(&pat.ty) {
                Some(mutable) => Kind::Exchange { mutable },
                None if is_named(&inner, "PathBuf") || is_named(&inner, "FileBytes") => {
                    Kind::FormFile
                }
                None => Kind::Body,
            },
        };

        if kind == Kind::FormFile && !(is_named(&inner, "PathBuf") || is_named(&inner, "FileBytes"))
        {
            return Err(syn::Error::new_spanned(
                &pat.ty,
                "#[form_file] parameters must be `PathBuf` or `FileBytes`",
            ));
        }

        let (explicit, default) = match marker {
            Some(marker) => (marker.name, marker.default),
            None => (None, None),
        };
        if default.is_some() && !matches!(kind, Kind::Param(_)) {
            return Err(syn::Error::new_spanned(
                &pat.ty,
                "`default` is only allowed on path, query and header parameters",
            ));
        }

        let name = match kind {
            Kind::Body => Some("body".to_owned()),
            Kind::Exchange { .. } => Some("exchange".to_owned()),
            Kind::Param("Header") => explicit.or_else(|| ident.map(|i| i.to_kebab_case())),
            _ => explicit.or(ident),
        }
        .ok_or_else(|| {
            syn::Error::new_spanned(&pat.pat, "expected a named parameter, or an explicit name")
        })?;

        Ok(Parameter {
            name,
            kind,
            span: pat.ty.span(),
            ty: (*pat.ty).clone(),
            inner,
            required,
            default,
        })
    }

    fn spec(&self) -> TokenStream {
        let name = &self.name;
        let source = syn::Ident::new(self.kind.source(), Span::call_site());
        let target = descriptor(&self.inner);
        let required = self.required;
        let default = option_lit(self.default.as_ref());

        quote! {
            ::proteus::metadata::ParameterSpec {
                name: #name,
                source: ::proteus::metadata::SourceKind::#source,
                target: #target,
                required: #required,
                default: #default,
            }
        }
    }

    /// The statement extracting the parameter into `local`; the exchange
    /// itself is passed directly.
    fn binding(&self, local: &syn::Ident) -> Option<TokenStream> {
        let ty = &self.ty;
        let inner = &self.inner;
        let name = &self.name;

        let value = match (self.kind, self.required, &self.default) {
            (Kind::Exchange { .. }, _, _) => return None,
            (Kind::Param(source), required, default) => {
                let source = syn::Ident::new(source, Span::call_site());
                let source = quote!(::proteus::metadata::SourceKind::#source);
                match (required, default) {
                    (true, None) => quote! {
                        ::proteus::extract::required::<#inner>(&*__exchange, #source, #name)?
                    },
                    (true, Some(default)) => quote! {
                        ::proteus::extract::with_default::<#inner>(&*__exchange, #source, #name, #default)?
                    },
                    (false, None) => quote! {
                        ::proteus::extract::optional::<#inner>(&*__exchange, #source, #name)
                    },
                    (false, Some(default)) => quote! {
                        ::proteus::extract::optional_with_default::<#inner>(&*__exchange, #source, #name, #default)
                    },
                }
            }
            (Kind::Body, true, _) if is_named(inner, "Bytes") => {
                quote!(::proteus::extract::body::bytes(&*__exchange)?)
            }
            (Kind::Body, false, _) if is_named(inner, "Bytes") => {
                quote!(::proteus::extract::body::optional_bytes(&*__exchange))
            }
            (Kind::Body, true, _) => {
                quote!(::proteus::extract::body::model::<#inner>(&*__exchange)?)
            }
            (Kind::Body, false, _) => {
                quote!(::proteus::extract::body::optional_model::<#inner>(&*__exchange)?)
            }
            (Kind::FormFile, true, _) if is_named(inner, "PathBuf") => {
                quote!(::proteus::extract::file::path(&*__exchange, #name)?)
            }
            (Kind::FormFile, false, _) if is_named(inner, "PathBuf") => {
                quote!(::proteus::extract::file::optional::path(&*__exchange, #name))
            }
            (Kind::FormFile, true, _) => {
                quote!(::proteus::extract::file::bytes(&*__exchange, #name).await?)
            }
            (Kind::FormFile, false, _) => {
                quote!(::proteus::extract::file::optional::bytes(&*__exchange, #name).await?)
            }
        };

        Some(quote_spanned! {self.span=>
            let #local: #ty = #value;
        })
    }

    fn argument(&self, local: &syn::Ident) -> TokenStream {
        match self.kind {
            Kind::Exchange { mutable: true } => quote!(&mut *__exchange),
            Kind::Exchange { mutable: false } => quote!(&*__exchange),
            _ => quote!(#local),
        }
    }
}

/// Reads the source marker off a parameter, and strips it.
fn take_marker(attrs: &mut Vec<syn::Attribute>) -> Result<Option<Marker>, syn::Error> {
    let mut marker = None;
    let mut kept = Vec::with_capacity(attrs.len());

    for attr in std::mem::take(attrs) {
        let source = if attr.path.is_ident("path_param") {
            Source::Path
        } else if attr.path.is_ident("query_param") {
            Source::Query
        } else if attr.path.is_ident("header_param") {
            Source::Header
        } else if attr.path.is_ident("form_file") {
            Source::FormFile
        } else {
            kept.push(attr);
            continue;
        };

        if marker.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "a parameter takes at most one source marker",
            ));
        }
        marker = Some(parse_marker(source, &attr)?);
    }

    *attrs = kept;
    Ok(marker)
}

fn parse_marker(source: Source, attr: &syn::Attribute) -> Result<Marker, syn::Error> {
    let mut marker = Marker {
        source,
        name: None,
        default: None,
    };

    match attr.parse_meta()? {
        syn::Meta::Path(_) => {}
        syn::Meta::NameValue(nv) => marker.name = Some(lit_str(&nv.lit)?.value()),
        syn::Meta::List(list) => {
            for nested in list.nested {
                match nested {
                    syn::NestedMeta::Lit(lit) => marker.name = Some(lit_str(&lit)?.value()),
                    syn::NestedMeta::Meta(syn::Meta::NameValue(nv)) if nv.path.is_ident("name") => {
                        marker.name = Some(lit_str(&nv.lit)?.value());
                    }
                    syn::NestedMeta::Meta(syn::Meta::NameValue(nv))
                        if nv.path.is_ident("default") =>
                    {
                        marker.default = Some(lit_str(&nv.lit)?.clone());
                    }
                    v => {
                        return Err(syn::Error::new_spanned(
                            v,
                            "expected `\"name\"`, `name = \"...\"`, or `default = \"...\"`",
                        ))
                    }
                }
            }
        }
    }

    Ok(marker)
}

fn verb_of(attr: &syn::Attribute) -> Result<Option<syn::Ident>, syn::Error> {
    for (marker, variant) in VERBS {
        if attr.path.is_ident(marker) {
            if !attr.tokens.is_empty() {
                return Err(syn::Error::new_spanned(
                    attr,
                    format!("#[{}] takes no arguments", marker),
                ));
            }
            return Ok(Some(syn::Ident::new(variant, attr.span())));
        }
    }
    Ok(None)
}

fn parse_path(attr: &syn::Attribute) -> Result<syn::LitStr, syn::Error> {
    match attr.parse_meta()? {
        syn::Meta::NameValue(nv) => lit_str(&nv.lit).cloned(),
        syn::Meta::List(list) if list.nested.len() == 1 => match list.nested.first() {
            Some(syn::NestedMeta::Lit(lit)) => lit_str(lit).cloned(),
            _ => Err(syn::Error::new_spanned(&list, "expected #[path(\"...\")]")),
        },
        m => Err(syn::Error::new_spanned(m, "expected #[path(\"...\")]")),
    }
}

/// The conversion of a method's return value into a reply.
fn reply(ty: Option<&syn::Type>, value: TokenStream) -> TokenStream {
    let empty = quote! {{
        let _ = #value;
        ::core::result::Result::<_, ::proteus::HandlerError>::Ok(::proteus::Reply::Empty)
    }};
    let ty = match ty.map(peel) {
        None => return empty,
        Some(syn::Type::Tuple(t)) if t.elems.is_empty() => return empty,
        Some(ty) => ty,
    };

    match last_segment(ty) {
        Some(segment) if segment.ident == "Result" => {
            let ok = reply(type_args(segment).first().copied(), quote!(__value));
            quote! {
                match #value {
                    ::core::result::Result::Ok(__value) => #ok,
                    ::core::result::Result::Err(__error) => ::core::result::Result::Err(
                        ::proteus::HandlerError::from_controller(__error),
                    ),
                }
            }
        }
        Some(segment) if segment.ident == "Response" => quote! {
            ::core::result::Result::<_, ::proteus::HandlerError>::Ok(::proteus::Reply::Response(#value))
        },
        _ if is_raw_bytes(ty) => quote! {
            ::core::result::Result::<_, ::proteus::HandlerError>::Ok(
                ::proteus::Reply::Raw(::core::convert::Into::into(#value)),
            )
        },
        _ => quote!(::proteus::Reply::json(&#value)),
    }
}

/// The `TypeDescriptor` of a parameter type.
fn descriptor(ty: &syn::Type) -> TokenStream {
    let ty = peel(ty);
    if let syn::Type::Reference(r) = ty {
        return descriptor(&r.elem);
    }

    let segment = match last_segment(ty) {
        Some(segment) => segment,
        None => {
            let name = ty.to_token_stream().to_string();
            return quote!(::proteus::metadata::TypeDescriptor::UserDefined(#name));
        }
    };

    let variant = match segment.ident.to_string().as_str() {
        "String" | "str" => Some("String"),
        "i32" => Some("Int32"),
        "i64" => Some("Int64"),
        "f32" => Some("Float32"),
        "f64" => Some("Float64"),
        "bool" => Some("Bool"),
        "DateTime" => Some("Date"),
        "Bytes" => Some("ByteBuffer"),
        "PathBuf" | "FileBytes" => Some("FilePath"),
        _ if is_raw_bytes(ty) => Some("ByteBuffer"),
        _ => None,
    };
    if let Some(variant) = variant {
        let variant = syn::Ident::new(variant, Span::call_site());
        return quote!(::proteus::metadata::TypeDescriptor::#variant);
    }

    let name = segment.ident.to_string();
    let elements = type_args(segment);
    if elements.is_empty() {
        quote!(::proteus::metadata::TypeDescriptor::UserDefined(#name))
    } else {
        let elements = elements.into_iter().map(descriptor);
        quote! {
            ::proteus::metadata::TypeDescriptor::Generic {
                container: #name,
                elements: &[#(#elements),*],
            }
        }
    }
}

fn type_name(ty: &syn::Type) -> Result<String, syn::Error> {
    last_segment(ty)
        .map(|segment| segment.ident.unraw().to_string())
        .ok_or_else(|| syn::Error::new_spanned(ty, "expected a named type"))
}

fn peel(mut ty: &syn::Type) -> &syn::Type {
    loop {
        match ty {
            syn::Type::Group(g) => ty = &g.elem,
            syn::Type::Paren(p) => ty = &p.elem,
            _ => return ty,
        }
    }
}

fn last_segment(ty: &syn::Type) -> Option<&syn::PathSegment> {
    match peel(ty) {
        syn::Type::Path(p) if p.qself.is_none() => p.path.segments.last(),
        _ => None,
    }
}

fn type_args(segment: &syn::PathSegment) -> Vec<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => vec![],
    }
}

fn is_named(ty: &syn::Type, name: &str) -> bool {
    last_segment(ty).map_or(false, |segment| segment.ident == name)
}

fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let segment = last_segment(ty).filter(|segment| segment.ident == "Option")?;
    match type_args(segment).as_slice() {
        [inner] => Some(*inner),
        _ => None,
    }
}

/// `Bytes`, or `Vec<u8>`.
fn is_raw_bytes(ty: &syn::Type) -> bool {
    match last_segment(ty) {
        Some(segment) if segment.ident == "Bytes" => true,
        Some(segment) if segment.ident == "Vec" => {
            matches!(type_args(segment).as_slice(), [element] if is_named(element, "u8"))
        }
        _ => false,
    }
}

/// `Some(mutable)` if the type is a reference to the exchange.
fn exchange_ref(ty: &syn::Type) -> Option<bool> {
    match peel(ty) {
        syn::Type::Reference(r) if is_named(&r.elem, "Exchange") => Some(r.mutability.is_some()),
        _ => None,
    }
}

fn option_lit(lit: Option<&syn::LitStr>) -> TokenStream {
    match lit {
        Some(lit) => quote!(::core::option::Option::Some(#lit)),
        None => quote!(::core::option::Option::None),
    }
}

fn lit_str(lit: &syn::Lit) -> Result<&syn::LitStr, syn::Error> {
    match lit {
        syn::Lit::Str(s) => Ok(s),
        _ => Err(syn::Error::new_spanned(lit, "expected string literal")),
    }
}
