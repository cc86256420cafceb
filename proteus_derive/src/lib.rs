use proc_macro::TokenStream;

mod controller;

#[proc_macro_attribute]
/// Turns an inherent `impl` block into a controller.
///
/// The attribute takes the class path of the controller, as
/// `#[controller(path = "/users")]` or `#[controller("/users")]`.  Every
/// `pub` method of the block is recorded; the ones carrying a verb marker
/// become routes, bound by `Server::mount`.  The generated code refers to
/// the `proteus` crate by name.
///
/// Method markers:
///
/// - `#[get]`, `#[post]`, `#[put]`, `#[delete]`, `#[options]`, `#[head]`,
///   `#[patch]` - the verb of the route.  More than one is rejected when
///   the controller is mounted.
/// - `#[path("/{id}")]` - the method path, composed with the class path.
///   Defaults to `"/"`, which contributes nothing.
///
/// Route methods take `&self`, may be `async`, and may not be generic.
///
/// Parameter markers:
///
/// - `#[path_param]`, `#[query_param]`, `#[header_param]` - the value is a
///   named path capture, query parameter, or header.  The name defaults to
///   the parameter's name (kebab-cased for headers), and can be given as
///   `#[query_param("limit")]` or `#[query_param(name = "limit")]`.  A
///   textual fallback for absent values is given as `default = "..."`.
/// - `#[form_file]` - the value is an uploaded file of a form, as a
///   `PathBuf` or `FileBytes`.  Parameters of those types need no marker.
///
/// Unmarked parameters of type `&Exchange` or `&mut Exchange` receive the
/// exchange itself; any other unmarked parameter is decoded from the body
/// (`Bytes` receives it raw).  Wrapping a parameter's type in `Option`
/// makes it optional.
///
/// Return values are written as follows: `()` is an empty 200; `Bytes` and
/// `Vec<u8>` are written raw, without a content type; a `Response` is
/// written as-is; a `Result` is unwrapped first, its error mapping to a 400
/// if it is a `BadInput` and a 500 otherwise; anything else is encoded as
/// JSON.
///
/// ```text
/// #[controller(path = "/users")]
/// impl Users {
///     #[get]
///     #[path("/{id}")]
///     pub async fn get_user(&self, #[path_param] id: i64) -> User {
///         User { id }
///     }
/// }
/// ```
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = syn::parse_macro_input!(attr as syn::AttributeArgs);
    let input = syn::parse_macro_input!(item as syn::ItemImpl);
    proc_macro::TokenStream::from(
        self::controller::controller(args, input).unwrap_or_else(|e| e.into_compile_error()),
    )
}
