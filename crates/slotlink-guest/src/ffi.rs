//! Raw `env` imports, one per host operation.
//!
//! Signatures are the exact wire shapes: inputs by value, then one
//! out-pointer per output, returning an `i32` error code. Nothing here
//! validates anything; see [`WasmHost`](crate::WasmHost) for the typed
//! wrapper.

macro_rules! declare_imports {
    ($(
        $variant:ident {
            symbol: $symbol:ident,
            export: $export:literal,
            namespace: $ns:ident,
            params: ( $( $p:ident : $pty:ident ),* $(,)? ),
            outputs: ( $( $o:ident : $oty:ident ),* $(,)? ),
        }
    ),* $(,)?) => {
        #[link(wasm_import_module = "env")]
        extern "C" {
            $(
                pub fn $symbol(
                    $( $p: $crate::__wire_param!($pty), )*
                    $( $o: $crate::__wire_out!($oty), )*
                ) -> i32;
            )*
        }
    };
}

slotlink_abi::for_each_host_op!(declare_imports);
