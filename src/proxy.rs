//! Capability seam for values that live on the engine side.
//!
//! A [`Proxied`] variant holds an opaque [`ProxyHandle`] and the [`Proxy`]
//! that knows how to serve it. Every accessor on [`Variant`] checks for a
//! proxied value first and delegates, so engine-owned and local values share
//! one contract.

use crate::core::VariantType;
use crate::{CallError, Color, ConvertError, Variant, Vector2, Vector3};
use std::fmt;
use std::sync::Arc;

/// Opaque 128-bit handle to an engine-owned value.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct ProxyHandle(pub [u64; 2]);

impl ProxyHandle {
    pub const fn new(high: u64, low: u64) -> Self {
        Self([high, low])
    }
}

/// Operators understood by [`Variant::calculate`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// Unary; the right operand is ignored.
    Negate,
    /// Unary; the right operand is ignored.
    Not,
    And,
    Or,
}

/// Resolves `handle` and rejects a proxy that hands back another proxy.
fn resolve<P: Proxy + ?Sized>(proxy: &P, handle: ProxyHandle) -> Result<Variant, String> {
    match proxy.materialize(handle) {
        Variant::Proxied(_) => Err(format!(
            "{proxy:?} materialized {handle:?} to another proxied value"
        )),
        local => Ok(local),
    }
}

/// Serves engine-owned values.
///
/// Only [`variant_type`](Proxy::variant_type) and
/// [`materialize`](Proxy::materialize) are required. The rest default to
/// materializing the value and running the local operation on the copy;
/// bindings override what they can answer without a copy. `set` and `call`
/// have no local meaning and are unsupported unless overridden.
pub trait Proxy: Send + Sync + fmt::Debug {
    fn variant_type(&self, handle: ProxyHandle) -> VariantType;

    /// Produces a fully local copy of the value. Must not return
    /// `Variant::Proxied`.
    fn materialize(&self, handle: ProxyHandle) -> Variant;

    fn to_bool(&self, handle: ProxyHandle) -> Result<bool, ConvertError> {
        resolve(self, handle).map_err(ConvertError::Proxy)?.try_to()
    }

    fn to_int(&self, handle: ProxyHandle) -> Result<i64, ConvertError> {
        resolve(self, handle).map_err(ConvertError::Proxy)?.try_to()
    }

    fn to_float(&self, handle: ProxyHandle) -> Result<f64, ConvertError> {
        resolve(self, handle).map_err(ConvertError::Proxy)?.try_to()
    }

    fn to_string_value(&self, handle: ProxyHandle) -> Result<String, ConvertError> {
        resolve(self, handle).map_err(ConvertError::Proxy)?.try_to()
    }

    fn to_vector2(&self, handle: ProxyHandle) -> Result<Vector2, ConvertError> {
        resolve(self, handle).map_err(ConvertError::Proxy)?.try_to()
    }

    fn to_vector3(&self, handle: ProxyHandle) -> Result<Vector3, ConvertError> {
        resolve(self, handle).map_err(ConvertError::Proxy)?.try_to()
    }

    fn to_color(&self, handle: ProxyHandle) -> Result<Color, ConvertError> {
        resolve(self, handle).map_err(ConvertError::Proxy)?.try_to()
    }

    fn hash(&self, handle: ProxyHandle) -> Result<u32, CallError> {
        resolve(self, handle).map_err(CallError::Proxy)?.hash()
    }

    fn duplicate(&self, handle: ProxyHandle) -> Result<Variant, CallError> {
        resolve(self, handle).map_err(CallError::Proxy)?.duplicate()
    }

    fn get(&self, handle: ProxyHandle, key: &Variant) -> Result<Variant, CallError> {
        resolve(self, handle).map_err(CallError::Proxy)?.get(key)
    }

    fn set(&self, handle: ProxyHandle, _key: Variant, _value: Variant) -> Result<(), CallError> {
        Err(CallError::Unsupported {
            operation: "set",
            ty: self.variant_type(handle),
        })
    }

    fn iter(&self, handle: ProxyHandle) -> Result<Vec<(Variant, Variant)>, CallError> {
        let local = resolve(self, handle).map_err(CallError::Proxy)?;
        Ok(local.iter()?.collect())
    }

    fn call(
        &self,
        handle: ProxyHandle,
        method: &str,
        _args: &[Variant],
    ) -> Result<Variant, CallError> {
        log::trace!("{self:?} has no method {method} for {handle:?}");
        Err(CallError::Unsupported {
            operation: "call",
            ty: self.variant_type(handle),
        })
    }

    fn calculate(
        &self,
        handle: ProxyHandle,
        op: Operator,
        other: &Variant,
    ) -> Result<Variant, CallError> {
        resolve(self, handle)
            .map_err(CallError::Proxy)?
            .calculate(op, other)
    }
}

/// An engine-owned value: a handle plus the proxy serving it.
#[derive(Clone)]
pub struct Proxied {
    handle: ProxyHandle,
    proxy: Arc<dyn Proxy>,
}

impl Proxied {
    pub fn new(proxy: Arc<dyn Proxy>, handle: ProxyHandle) -> Self {
        Self { handle, proxy }
    }

    pub fn handle(&self) -> ProxyHandle {
        self.handle
    }

    pub fn proxy(&self) -> &dyn Proxy {
        &*self.proxy
    }

    pub fn variant_type(&self) -> VariantType {
        self.proxy.variant_type(self.handle)
    }

    pub fn materialize(&self) -> Variant {
        log::trace!("materializing {:?} through {:?}", self.handle, self.proxy);
        self.proxy.materialize(self.handle)
    }
}

/// Same handle served by the same proxy instance.
impl PartialEq for Proxied {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
            && std::ptr::addr_eq(Arc::as_ptr(&self.proxy), Arc::as_ptr(&other.proxy))
    }
}

impl fmt::Debug for Proxied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxied")
            .field("handle", &self.handle)
            .field("proxy", &self.proxy)
            .finish()
    }
}
