//! Runtime signature descriptors.
//!
//! Every overload carries one, derived from its native parameter and return
//! types at registration. The formatted form appears verbatim in dispatch
//! diagnostics, so its shape is part of the observable behavior.

use std::fmt;

/// The signature of one registered overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    ret: &'static str,
    receiver: Option<&'static str>,
    params: Vec<&'static str>,
}

impl Signature {
    pub fn function(ret: &'static str, params: Vec<&'static str>) -> Self {
        Signature {
            ret,
            receiver: None,
            params,
        }
    }

    pub fn method(ret: &'static str, receiver: &'static str, params: Vec<&'static str>) -> Self {
        Signature {
            ret,
            receiver: Some(receiver),
            params,
        }
    }

    /// Raw-argument overloads have no statically-known parameter list.
    pub fn raw() -> Self {
        Signature {
            ret: "any",
            receiver: None,
            params: vec!["..."],
        }
    }

    /// Number of script-side arguments this overload consumes. The receiver
    /// does not count; it arrives through the call's `this`, not the
    /// argument list.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn ret(&self) -> &'static str {
        self.ret
    }

    pub fn receiver(&self) -> Option<&'static str> {
        self.receiver
    }

    pub fn params(&self) -> &[&'static str] {
        &self.params
    }

    /// `ret (a, b)` for free functions, `ret Recv::(a, b)` for methods.
    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.ret)?;
        if let Some(receiver) = self.receiver {
            write!(f, "{receiver}::")?;
        }
        write!(f, "({})", self.params.join(", "))
    }
}
