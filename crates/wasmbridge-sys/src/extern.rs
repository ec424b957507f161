use std::ptr;

use wasmtime::{Extern, Func, Global, Memory, Table};

use crate::{
    WB_EXTERN_FUNC, WB_EXTERN_GLOBAL, WB_EXTERN_MEMORY, WB_EXTERN_TABLE, WB_EXTERN_UNSUPPORTED,
    wb_externkind_t,
};

/// Any importable or exportable object.
#[derive(Clone)]
pub struct wb_extern_t {
    pub(crate) which: Extern,
}

pub extern "C" fn wb_extern_kind(e: &wb_extern_t) -> wb_externkind_t {
    match e.which {
        Extern::Func(_) => WB_EXTERN_FUNC,
        Extern::Global(_) => WB_EXTERN_GLOBAL,
        Extern::Table(_) => WB_EXTERN_TABLE,
        Extern::Memory(_) => WB_EXTERN_MEMORY,
        _ => WB_EXTERN_UNSUPPORTED,
    }
}

pub extern "C" fn wb_extern_delete(_e: Box<wb_extern_t>) {}

// Each view is a transparent wrapper around `wb_extern_t`, so a view can be
// borrowed straight out of an extern and handed back as one.
macro_rules! extern_view {
    (
        $name:ident, $variant:ident, $inner:ty, $get:ident,
        $as_extern:ident, $extern_as:ident, $copy:ident, $delete:ident
    ) => {
        #[repr(transparent)]
        #[derive(Clone)]
        pub struct $name {
            pub(crate) ext: wb_extern_t,
        }

        impl $name {
            pub(crate) fn new(inner: $inner) -> Self {
                Self {
                    ext: wb_extern_t {
                        which: Extern::$variant(inner),
                    },
                }
            }

            pub(crate) fn $get(&self) -> $inner {
                match &self.ext.which {
                    Extern::$variant(inner) => *inner,
                    _ => unreachable!(concat!(stringify!($name), " does not hold a ", stringify!($variant))),
                }
            }
        }

        pub extern "C" fn $as_extern(view: &$name) -> &wb_extern_t {
            &view.ext
        }

        pub extern "C" fn $extern_as(e: &wb_extern_t) -> Option<&$name> {
            match &e.which {
                Extern::$variant(_) => Some(unsafe { &*ptr::from_ref(e).cast::<$name>() }),
                _ => None,
            }
        }

        pub extern "C" fn $copy(view: &$name) -> Box<$name> {
            Box::new(view.clone())
        }

        pub extern "C" fn $delete(_view: Box<$name>) {}
    };
}

extern_view!(
    wb_func_t, Func, Func, func,
    wb_func_as_extern, wb_extern_as_func, wb_func_copy, wb_func_delete
);
extern_view!(
    wb_global_t, Global, Global, global,
    wb_global_as_extern, wb_extern_as_global, wb_global_copy, wb_global_delete
);
extern_view!(
    wb_memory_t, Memory, Memory, memory,
    wb_memory_as_extern, wb_extern_as_memory, wb_memory_copy, wb_memory_delete
);
extern_view!(
    wb_table_t, Table, Table, table,
    wb_table_as_extern, wb_extern_as_table, wb_table_copy, wb_table_delete
);
