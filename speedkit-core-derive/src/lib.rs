mod deserialize;

use syn::{parse_macro_input, ItemStruct};

#[proc_macro_derive(Deserialize)]
pub fn derive_deserialize(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as ItemStruct);

    deserialize::derive_deserialize_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
