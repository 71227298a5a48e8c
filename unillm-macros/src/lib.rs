//! Procedural macros for the unillm tool registry
//!
//! This crate provides the `#[tool]` attribute that turns a plain Rust function
//! into a `unillm::tools::Tool`, deriving its parameter schema from the
//! function signature.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, ExprLit, FnArg, ItemFn, Lit, Meta, Pat,
    PatType, Token, Type, Visibility,
};

/// The `#[tool]` procedural macro
///
/// Transforms a synchronous function returning `Result<T, E>` into a tool.
/// `T` must implement `serde::Serialize` and `E` must implement `Display`.
///
/// # Example
///
/// ```rust,ignore
/// use unillm::tool;
///
/// #[tool]
/// /// Add two numbers
/// fn add(
///     /// First number
///     a: f64,
///     /// Second number
///     b: f64,
/// ) -> Result<f64, String> {
///     Ok(a + b)
/// }
///
/// let tool = add(); // Arc<dyn unillm::tools::Tool>
/// ```
///
/// This generates:
/// - `add_impl`, the original function under a new name
/// - `AddTool`, a unit struct implementing `Tool`
/// - `add()`, a constructor returning the tool behind an `Arc`
///
/// `Option<T>` parameters are optional (they have a default of `None`);
/// every other parameter is required.
#[proc_macro_attribute]
pub fn tool(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_tool_impl(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_tool_impl(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<TokenStream2> {
    let tool_config = parse_tool_args(&args)?;
    let fn_info = parse_function(&input_fn)?;

    let renamed_fn = generate_renamed_function(&input_fn);
    let tool_struct = generate_tool_struct(&fn_info);
    let tool_impl = generate_tool_trait_impl(&fn_info, &tool_config);
    let function_constructor = generate_function_constructor(&fn_info);

    Ok(quote! {
        #renamed_fn

        #tool_struct

        #tool_impl

        #function_constructor
    })
}

#[derive(Debug, Default)]
struct ToolConfig {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug)]
struct FunctionInfo {
    name: String,
    vis: Visibility,
    inputs: Vec<FunctionInput>,
    doc_comment: Option<String>,
}

#[derive(Debug)]
struct FunctionInput {
    name: String,
    ty: Type,
    doc_comment: Option<String>,
    is_optional: bool,
}

fn parse_tool_args(args: &Punctuated<Meta, Token![,]>) -> syn::Result<ToolConfig> {
    let mut config = ToolConfig::default();

    for arg in args {
        match arg {
            Meta::NameValue(nv) if nv.path.is_ident("name") => {
                config.name = Some(string_literal(&nv.value)?);
            }
            Meta::NameValue(nv) if nv.path.is_ident("description") => {
                config.description = Some(string_literal(&nv.value)?);
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    arg,
                    "Unsupported tool attribute. Use `name` or `description`",
                ));
            }
        }
    }

    Ok(config)
}

fn string_literal(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(lit_str),
            ..
        }) => Ok(lit_str.value()),
        other => Err(syn::Error::new_spanned(other, "Expected a string literal")),
    }
}

fn parse_function(input_fn: &ItemFn) -> syn::Result<FunctionInfo> {
    if let Some(asyncness) = &input_fn.sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "Tool functions must be synchronous",
        ));
    }

    let mut inputs = Vec::new();
    for input in &input_fn.sig.inputs {
        match input {
            FnArg::Typed(PatType { pat, ty, attrs, .. }) => {
                let Pat::Ident(pat_ident) = pat.as_ref() else {
                    return Err(syn::Error::new_spanned(
                        pat,
                        "Tool parameters must be plain identifiers",
                    ));
                };
                if let Type::Reference(_) = ty.as_ref() {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "Tool parameters must be owned types",
                    ));
                }

                inputs.push(FunctionInput {
                    name: pat_ident.ident.to_string(),
                    ty: (**ty).clone(),
                    doc_comment: extract_doc_comment(attrs),
                    is_optional: is_option_type(ty),
                });
            }
            FnArg::Receiver(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Tool functions cannot have self parameters",
                ));
            }
        }
    }

    Ok(FunctionInfo {
        name: input_fn.sig.ident.to_string(),
        vis: input_fn.vis.clone(),
        inputs,
        doc_comment: extract_doc_comment(&input_fn.attrs),
    })
}

fn extract_doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let mut doc_lines = Vec::new();

    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let Meta::NameValue(nv) = &attr.meta {
            if let Expr::Lit(ExprLit {
                lit: Lit::Str(lit_str),
                ..
            }) = &nv.value
            {
                let line = lit_str.value();
                doc_lines.push(line.strip_prefix(' ').unwrap_or(&line).to_string());
            }
        }
    }

    let joined = doc_lines.join("\n").trim().to_string();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

/// Emit the original function as `<name>_impl`, with parameter doc comments removed
fn generate_renamed_function(input_fn: &ItemFn) -> TokenStream2 {
    let mut renamed_fn = input_fn.clone();
    renamed_fn.sig.ident = format_ident!("{}_impl", input_fn.sig.ident);
    for input in renamed_fn.sig.inputs.iter_mut() {
        if let FnArg::Typed(pat_type) = input {
            pat_type.attrs.retain(|attr| !attr.path().is_ident("doc"));
        }
    }

    quote! { #renamed_fn }
}

fn generate_function_constructor(fn_info: &FunctionInfo) -> TokenStream2 {
    let fn_name = format_ident!("{}", fn_info.name);
    let struct_name = format_ident!("{}Tool", snake_to_pascal(&fn_info.name));
    let vis = &fn_info.vis;

    quote! {
        /// Create a shareable instance of this tool
        #vis fn #fn_name() -> std::sync::Arc<dyn unillm::tools::Tool> {
            std::sync::Arc::new(#struct_name)
        }
    }
}

fn generate_tool_struct(fn_info: &FunctionInfo) -> TokenStream2 {
    let struct_name = format_ident!("{}Tool", snake_to_pascal(&fn_info.name));
    let vis = &fn_info.vis;

    quote! {
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #struct_name;
    }
}

fn generate_tool_trait_impl(fn_info: &FunctionInfo, tool_config: &ToolConfig) -> TokenStream2 {
    let struct_name = format_ident!("{}Tool", snake_to_pascal(&fn_info.name));
    let fn_impl_name = format_ident!("{}_impl", fn_info.name);

    let tool_name = tool_config.name.as_ref().unwrap_or(&fn_info.name);
    let description = match tool_config
        .description
        .as_ref()
        .or(fn_info.doc_comment.as_ref())
    {
        Some(text) => quote! { Some(#text) },
        None => quote! { None },
    };

    let param_specs = generate_param_specs(&fn_info.inputs);
    let param_extractions = generate_parameter_extraction(&fn_info.inputs);
    let known_names: Vec<&String> = fn_info.inputs.iter().map(|input| &input.name).collect();
    let param_idents: Vec<_> = fn_info
        .inputs
        .iter()
        .map(|input| format_ident!("{}", input.name))
        .collect();

    quote! {
        impl unillm::tools::Tool for #struct_name {
            fn name(&self) -> &str {
                #tool_name
            }

            fn description(&self) -> Option<&str> {
                #description
            }

            fn parameters(&self) -> Vec<unillm::tools::ParamSpec> {
                vec![#(#param_specs),*]
            }

            fn call(
                &self,
                __arguments: unillm::__serde_json::Map<String, unillm::__serde_json::Value>,
            ) -> Result<unillm::__serde_json::Value, unillm::tools::ToolError> {
                const KNOWN: &[&str] = &[#(#known_names),*];
                if let Some(unexpected) = __arguments.keys().find(|key| !KNOWN.contains(&key.as_str())) {
                    return Err(unillm::tools::ToolError::InvalidArguments {
                        message: format!("unexpected argument '{}'", unexpected),
                    });
                }

                #(#param_extractions)*

                match #fn_impl_name(#(#param_idents),*) {
                    Ok(value) => unillm::__serde_json::to_value(value).map_err(|e| {
                        unillm::tools::ToolError::ExecutionFailed {
                            message: format!("failed to serialize result: {}", e),
                        }
                    }),
                    Err(e) => Err(unillm::tools::ToolError::ExecutionFailed {
                        message: e.to_string(),
                    }),
                }
            }
        }
    }
}

fn generate_param_specs(inputs: &[FunctionInput]) -> Vec<TokenStream2> {
    inputs
        .iter()
        .map(|input| {
            let name = &input.name;
            let param_type = param_type_tokens(rust_type_to_json_schema(&input.ty));
            let has_default = input.is_optional;
            let spec = quote! {
                unillm::tools::ParamSpec::new(#name, Some(#param_type), #has_default)
            };
            match &input.doc_comment {
                Some(doc) => quote! { #spec.with_description(#doc) },
                None => spec,
            }
        })
        .collect()
}

fn param_type_tokens(json_type: &str) -> TokenStream2 {
    match json_type {
        "integer" => quote! { unillm::tools::ParamType::Integer },
        "number" => quote! { unillm::tools::ParamType::Number },
        "boolean" => quote! { unillm::tools::ParamType::Boolean },
        "array" => quote! { unillm::tools::ParamType::Array },
        "object" => quote! { unillm::tools::ParamType::Object },
        _ => quote! { unillm::tools::ParamType::String },
    }
}

/// Map a Rust type onto its JSON schema type name
fn rust_type_to_json_schema(ty: &Type) -> &'static str {
    let Type::Path(type_path) = ty else {
        return "string";
    };
    let Some(segment) = type_path.path.segments.last() else {
        return "string";
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" | "char" => "string",
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => "integer",
        "f32" | "f64" => "number",
        "bool" => "boolean",
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => "array",
        "HashMap" | "BTreeMap" | "Map" => "object",
        "Option" => {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner_ty)) = args.args.first() {
                    return rust_type_to_json_schema(inner_ty);
                }
            }
            "string"
        }
        _ => "string",
    }
}

fn generate_parameter_extraction(inputs: &[FunctionInput]) -> Vec<TokenStream2> {
    inputs
        .iter()
        .map(|input| {
            let param_name = format_ident!("{}", input.name);
            let param_str = &input.name;
            let ty = &input.ty;

            if input.is_optional {
                quote! {
                    let #param_name: #ty = match __arguments.get(#param_str) {
                        None => None,
                        Some(value) => unillm::__serde_json::from_value(value.clone()).map_err(|e| {
                            unillm::tools::ToolError::InvalidArguments {
                                message: format!("argument '{}': {}", #param_str, e),
                            }
                        })?,
                    };
                }
            } else {
                quote! {
                    let #param_name: #ty = {
                        let value = __arguments.get(#param_str).ok_or_else(|| {
                            unillm::tools::ToolError::InvalidArguments {
                                message: format!("missing required argument '{}'", #param_str),
                            }
                        })?;
                        unillm::__serde_json::from_value(value.clone()).map_err(|e| {
                            unillm::tools::ToolError::InvalidArguments {
                                message: format!("argument '{}': {}", #param_str, e),
                            }
                        })?
                    };
                }
            }
        })
        .collect()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

fn snake_to_pascal(s: &str) -> String {
    s.split('_').map(capitalize_first).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_snake_to_pascal() {
        assert_eq!(snake_to_pascal("calculate"), "Calculate");
        assert_eq!(snake_to_pascal("get_weather"), "GetWeather");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_rust_type_to_json_schema() {
        let cases: Vec<(Type, &str)> = vec![
            (parse_quote!(String), "string"),
            (parse_quote!(i64), "integer"),
            (parse_quote!(f64), "number"),
            (parse_quote!(bool), "boolean"),
            (parse_quote!(Vec<String>), "array"),
            (parse_quote!(std::collections::HashMap<String, i32>), "object"),
            (parse_quote!(Option<u32>), "integer"),
            (parse_quote!(MyStruct), "string"),
        ];
        for (ty, expected) in cases {
            assert_eq!(rust_type_to_json_schema(&ty), expected);
        }
    }

    #[test]
    fn test_is_option_type() {
        let option_type: Type = parse_quote!(Option<String>);
        assert!(is_option_type(&option_type));

        let string_type: Type = parse_quote!(String);
        assert!(!is_option_type(&string_type));
    }

    #[test]
    fn test_parse_tool_args() {
        let args: Punctuated<Meta, Token![,]> =
            parse_quote!(name = "calc", description = "Does math");
        let config = parse_tool_args(&args).unwrap();
        assert_eq!(config.name.as_deref(), Some("calc"));
        assert_eq!(config.description.as_deref(), Some("Does math"));

        let empty: Punctuated<Meta, Token![,]> = Punctuated::new();
        assert!(parse_tool_args(&empty).unwrap().name.is_none());
    }

    #[test]
    fn test_parse_function_collects_docs_and_optionals() {
        let item: ItemFn = parse_quote! {
            /// Look up the weather
            fn get_weather(
                /// City name
                location: String,
                units: Option<String>,
            ) -> Result<String, String> {
                Ok(location)
            }
        };
        let info = parse_function(&item).unwrap();
        assert_eq!(info.doc_comment.as_deref(), Some("Look up the weather"));
        assert_eq!(info.inputs.len(), 2);
        assert_eq!(info.inputs[0].doc_comment.as_deref(), Some("City name"));
        assert!(!info.inputs[0].is_optional);
        assert!(info.inputs[1].is_optional);
    }

    #[test]
    fn test_parse_function_rejects_async_and_references() {
        let async_fn: ItemFn = parse_quote! {
            async fn slow(x: i32) -> Result<i32, String> { Ok(x) }
        };
        assert!(parse_function(&async_fn).is_err());

        let borrowed: ItemFn = parse_quote! {
            fn borrowed(x: &str) -> Result<String, String> { Ok(x.to_string()) }
        };
        assert!(parse_function(&borrowed).is_err());
    }

    #[test]
    fn test_expansion_paths_go_through_unillm() {
        let item: ItemFn = parse_quote! {
            /// Echo the first value
            fn first(values: Vec<String>, limit: Option<u32>) -> Result<String, String> {
                Ok(values.into_iter().take(limit.unwrap_or(1) as usize).collect())
            }
        };
        let expanded = generate_tool_impl(Punctuated::new(), item).unwrap().to_string();

        assert!(expanded.contains("unillm :: __serde_json :: from_value"));
        assert!(expanded.contains("unillm :: __serde_json :: to_value"));
        assert!(!expanded.replace("__serde_json", "").contains("serde_json"));
    }

    #[test]
    fn test_renamed_function_drops_param_docs() {
        let item: ItemFn = parse_quote! {
            fn echo(
                /// Text to echo
                text: String,
            ) -> Result<String, String> {
                Ok(text)
            }
        };
        let renamed: ItemFn = syn::parse2(generate_renamed_function(&item)).unwrap();
        assert_eq!(renamed.sig.ident, "echo_impl");
        match renamed.sig.inputs.first() {
            Some(FnArg::Typed(pat_type)) => assert!(pat_type.attrs.is_empty()),
            other => panic!("unexpected input: {:?}", other),
        }
    }
}
