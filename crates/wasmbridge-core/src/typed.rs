//! Statically typed host functions.
//!
//! [`Func::wrap`](crate::Func::wrap) derives a function type from a Rust
//! closure's signature. Three traits make that work:
//! - [`WasmTy`]: a Rust type that maps to exactly one wasm value kind
//! - [`WasmResults`]: what a closure may return, i.e. `()`, one value, a
//!   tuple of values, or a `Result<_, Trap>` of any of those
//! - [`IntoFunc`]: closures of up to eight [`WasmTy`] parameters, with or
//!   without a leading [`Caller`]

use wasmbridge_common::{Error, FuncType, Trap, ValKind};

use crate::trampoline::HostCallback;
use crate::{Caller, ExternRef, Func, Val};

/// A Rust type with a fixed wasm representation.
pub trait WasmTy: Sized {
    /// The wasm kind of this type.
    fn kind() -> ValKind;

    /// Convert into a [`Val`].
    fn into_val(self) -> Val;

    /// Convert from a [`Val`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] if `val` has another kind.
    fn from_val(val: &Val) -> Result<Self, Error>;
}

impl WasmTy for i32 {
    fn kind() -> ValKind {
        ValKind::I32
    }
    fn into_val(self) -> Val {
        Val::I32(self)
    }
    fn from_val(val: &Val) -> Result<Self, Error> {
        val.i32()
    }
}

impl WasmTy for i64 {
    fn kind() -> ValKind {
        ValKind::I64
    }
    fn into_val(self) -> Val {
        Val::I64(self)
    }
    fn from_val(val: &Val) -> Result<Self, Error> {
        val.i64()
    }
}

impl WasmTy for f32 {
    fn kind() -> ValKind {
        ValKind::F32
    }
    fn into_val(self) -> Val {
        Val::F32(self.to_bits())
    }
    fn from_val(val: &Val) -> Result<Self, Error> {
        val.f32()
    }
}

impl WasmTy for f64 {
    fn kind() -> ValKind {
        ValKind::F64
    }
    fn into_val(self) -> Val {
        Val::F64(self.to_bits())
    }
    fn from_val(val: &Val) -> Result<Self, Error> {
        val.f64()
    }
}

impl WasmTy for Option<Func> {
    fn kind() -> ValKind {
        ValKind::FuncRef
    }
    fn into_val(self) -> Val {
        Val::FuncRef(self)
    }
    fn from_val(val: &Val) -> Result<Self, Error> {
        val.funcref().map(Option::<&Func>::cloned)
    }
}

impl WasmTy for Option<ExternRef> {
    fn kind() -> ValKind {
        ValKind::ExternRef
    }
    fn into_val(self) -> Val {
        Val::ExternRef(self)
    }
    fn from_val(val: &Val) -> Result<Self, Error> {
        val.externref().map(Option::<&ExternRef>::cloned)
    }
}

/// The return type of a wrapped host function.
pub trait WasmResults {
    /// Result kinds, in order.
    fn kinds() -> Vec<ValKind>;

    /// Convert into result values, or the trap to raise instead.
    ///
    /// # Errors
    ///
    /// Returns the closure's own trap for `Err` results.
    fn into_vals(self) -> Result<Vec<Val>, Trap>;
}

impl<T: WasmTy> WasmResults for T {
    fn kinds() -> Vec<ValKind> {
        vec![T::kind()]
    }
    fn into_vals(self) -> Result<Vec<Val>, Trap> {
        Ok(vec![self.into_val()])
    }
}

impl<T: WasmResults> WasmResults for Result<T, Trap> {
    fn kinds() -> Vec<ValKind> {
        T::kinds()
    }
    fn into_vals(self) -> Result<Vec<Val>, Trap> {
        self.and_then(T::into_vals)
    }
}

macro_rules! impl_wasm_results_tuple {
    ($($t:ident $n:tt),*) => {
        impl<$($t: WasmTy),*> WasmResults for ($($t,)*) {
            fn kinds() -> Vec<ValKind> {
                vec![$($t::kind()),*]
            }
            fn into_vals(self) -> Result<Vec<Val>, Trap> {
                Ok(vec![$(self.$n.into_val()),*])
            }
        }
    };
}

impl_wasm_results_tuple!();
impl_wasm_results_tuple!(A 0);
impl_wasm_results_tuple!(A 0, B 1);
impl_wasm_results_tuple!(A 0, B 1, C 2);
impl_wasm_results_tuple!(A 0, B 1, C 2, D 3);

/// Closures that can become host functions.
///
/// `Params` is a tuple of the parameter types, prefixed with [`Caller`] when
/// the closure takes one. It exists only to keep the impls apart and is
/// always inferred.
pub trait IntoFunc<Params, Results>: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_host_func(self) -> (FuncType, HostCallback);
}

fn host_callback<F>(f: F) -> HostCallback
where
    F: Fn(Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap> + Send + Sync + 'static,
{
    Box::new(f)
}

fn param<T: WasmTy>(args: &mut std::slice::Iter<'_, Val>) -> Result<T, Trap> {
    let val = args
        .next()
        .ok_or_else(|| Trap::new("host function received too few arguments"))?;
    T::from_val(val).map_err(|e| Trap::new(e.to_string()))
}

macro_rules! impl_into_func {
    ($($p:ident)*) => {
        #[allow(non_snake_case)]
        impl<F, $($p,)* R> IntoFunc<($($p,)*), R> for F
        where
            F: Fn($($p),*) -> R + Send + Sync + 'static,
            $($p: WasmTy,)*
            R: WasmResults,
        {
            fn into_host_func(self) -> (FuncType, HostCallback) {
                let params: Vec<ValKind> = vec![$($p::kind()),*];
                let ty = FuncType::new(params, R::kinds());
                let callback = host_callback(move |_caller, args| {
                    #[allow(unused_mut, unused_variables)]
                    let mut args = args.iter();
                    $(let $p = param::<$p>(&mut args)?;)*
                    (self)($($p),*).into_vals()
                });
                (ty, callback)
            }
        }

        #[allow(non_snake_case)]
        impl<F, $($p,)* R> IntoFunc<(Caller<'_>, $($p,)*), R> for F
        where
            F: Fn(Caller<'_>, $($p),*) -> R + Send + Sync + 'static,
            $($p: WasmTy,)*
            R: WasmResults,
        {
            fn into_host_func(self) -> (FuncType, HostCallback) {
                let params: Vec<ValKind> = vec![$($p::kind()),*];
                let ty = FuncType::new(params, R::kinds());
                let callback = host_callback(move |caller, args| {
                    #[allow(unused_mut, unused_variables)]
                    let mut args = args.iter();
                    $(let $p = param::<$p>(&mut args)?;)*
                    (self)(caller, $($p),*).into_vals()
                });
                (ty, callback)
            }
        }
    };
}

impl_into_func!();
impl_into_func!(A1);
impl_into_func!(A1 A2);
impl_into_func!(A1 A2 A3);
impl_into_func!(A1 A2 A3 A4);
impl_into_func!(A1 A2 A3 A4 A5);
impl_into_func!(A1 A2 A3 A4 A5 A6);
impl_into_func!(A1 A2 A3 A4 A5 A6 A7);
impl_into_func!(A1 A2 A3 A4 A5 A6 A7 A8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, Store};

    fn ty_of<P, R>(f: impl IntoFunc<P, R>) -> FuncType {
        f.into_host_func().0
    }

    #[test]
    fn test_inferred_types() {
        assert_eq!(ty_of(|| {}), FuncType::default());
        assert_eq!(
            ty_of(|a: i32, b: i64| f64::from(a) + b as f64),
            FuncType::new([ValKind::I32, ValKind::I64], [ValKind::F64])
        );
        assert_eq!(
            ty_of(|_: Caller<'_>, r: Option<ExternRef>| r),
            FuncType::new([ValKind::ExternRef], [ValKind::ExternRef])
        );
        assert_eq!(
            ty_of(|x: f32| -> Result<(i32, f32), Trap> { Ok((1, x)) }),
            FuncType::new([ValKind::F32], [ValKind::I32, ValKind::F32])
        );
    }

    #[test]
    fn test_eight_params() {
        let ty = ty_of(
            |a: i32, b: i32, c: i32, d: i32, e: i64, f: i64, g: i64, h: i64| {
                i64::from(a + b + c + d) + e + f + g + h
            },
        );
        assert_eq!(ty.params().len(), 8);
        assert_eq!(ty.results(), &[ValKind::I64]);
    }

    #[test]
    fn test_result_err_becomes_trap() {
        let vals = Err::<i32, _>(Trap::new("denied")).into_vals().unwrap_err();
        assert_eq!(vals.message(), "denied");

        let vals = Ok::<_, Trap>((1i32, 2i64)).into_vals().unwrap();
        assert_eq!(vals.len(), 2);
        assert_eq!(vals[1].i64().unwrap(), 2);
    }

    #[test]
    fn test_wrapped_call() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let add = Func::wrap(&mut store, |a: i32, b: i32| a.wrapping_add(b)).unwrap();
        let results = add.call(&mut store, &[Val::I32(2), Val::I32(40)]).unwrap();
        assert_eq!(results[0].i32().unwrap(), 42);

        let swap = Func::wrap(&mut store, |a: i64, b: f32| (b, a)).unwrap();
        let results = swap.call(&mut store, &[Val::I64(9), Val::from(0.5f32)]).unwrap();
        assert_eq!(results[0].f32().unwrap(), 0.5);
        assert_eq!(results[1].i64().unwrap(), 9);
    }

    #[test]
    fn test_wrapped_trap() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let deny = Func::wrap(&mut store, |_: Caller<'_>| -> Result<(), Trap> {
            Err(Trap::new("not allowed"))
        })
        .unwrap();
        let err = deny.call(&mut store, &[]).unwrap_err();
        assert_eq!(err.as_trap().map(Trap::message), Some("not allowed"));
    }
}
