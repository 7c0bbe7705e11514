// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a cloneable, thread-safe wrapper around a user-provided callback.
///
/// The generated type stores the callback as `Arc<dyn Fn(..) -> R + Send + Sync>` and provides
/// `new`, `call`, `Clone` and a `Debug` that prints only the type name.
///
/// ```rust,ignore
/// define_fn_wrapper!(OnStateChange(Fn(state: CircuitState)));
/// define_fn_wrapper!(IsBreakable<E>(Fn(error: &ExecError<E>) -> bool));
/// ```
macro_rules! define_fn_wrapper {
    ($name:ident$(<$($generics:ident),*>)?(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        pub(crate) struct $name$(<$($generics),*>)?(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl$(<$($generics),*>)? $name$(<$($generics),*>)? {
            pub(crate) fn new<F>(callback: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(callback))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl$(<$($generics),*>)? Clone for $name$(<$($generics),*>)? {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl$(<$($generics),*>)? std::fmt::Debug for $name$(<$($generics),*>)? {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(stringify!($name))
            }
        }
    };

    ($name:ident$(<$($generics:ident),*>)?(Fn($($param_name:ident: $param_ty:ty),*))) => {
        $crate::utils::define_fn_wrapper!($name$(<$($generics),*>)?(Fn($($param_name: $param_ty),*) -> ()));
    };
}

pub(crate) use define_fn_wrapper;
