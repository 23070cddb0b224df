//! Capability descriptors.
//!
//! A capability is a collaborator trait the unit under test talks to. Each
//! one is described once, as a closed list of methods with their parameter
//! directions; [`Proxy`](crate::adapters::Proxy) checks every intercepted
//! call against that list.
//!
//! Implement [`Capability`] on the trait object type:
//!
//! ```
//! use callspec::ports::{Capability, MethodDescriptor, ParamDescriptor};
//!
//! pub trait Inventory: Send + Sync {
//!     fn check_stock(&self, product_id: &str, quantity: u32) -> callspec::Result<bool>;
//! }
//!
//! impl Capability for dyn Inventory {
//!     const NAME: &'static str = "Inventory";
//!     const METHODS: &'static [MethodDescriptor] = &[MethodDescriptor::new(
//!         "CheckStock",
//!         &[ParamDescriptor::input("productId"), ParamDescriptor::input("quantity")],
//!         true,
//!     )];
//! }
//!
//! assert!(<dyn Inventory>::method("CheckStock").is_some());
//! ```

use crate::registry::short_type_name;

/// Data-flow direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Read by the callee only.
    In,
    /// Written by the callee only.
    Out,
    /// Read and then overwritten by the callee.
    InOut,
}

impl Direction {
    /// Whether the pre-call value is logged as an input.
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    /// Whether the post-call value is logged as an output.
    #[must_use]
    pub fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// One parameter of a capability method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDescriptor {
    /// Name written into the specification.
    pub name: &'static str,
    /// Data-flow direction.
    pub direction: Direction,
}

impl ParamDescriptor {
    /// An input parameter.
    #[must_use]
    pub const fn input(name: &'static str) -> Self {
        Self { name, direction: Direction::In }
    }

    /// An output-only parameter.
    #[must_use]
    pub const fn output(name: &'static str) -> Self {
        Self { name, direction: Direction::Out }
    }

    /// A parameter that is both read and written.
    #[must_use]
    pub const fn inout(name: &'static str) -> Self {
        Self { name, direction: Direction::InOut }
    }
}

/// One method of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Name written into the specification.
    pub name: &'static str,
    /// Parameters in declaration order.
    pub params: &'static [ParamDescriptor],
    /// Whether the method produces a return value.
    pub returns: bool,
}

impl MethodDescriptor {
    /// Describes a method.
    #[must_use]
    pub const fn new(name: &'static str, params: &'static [ParamDescriptor], returns: bool) -> Self {
        Self { name, params, returns }
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&'static ParamDescriptor> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Names of the parameters logged before the call, in order.
    pub fn input_names(&self) -> impl Iterator<Item = &'static str> {
        self.params.iter().filter(|param| param.direction.is_input()).map(|param| param.name)
    }
}

/// A collaborator trait that can be recorded and replayed.
pub trait Capability: Send + Sync + 'static {
    /// Role name used for constructor blocks.
    const NAME: &'static str;
    /// Every interceptable method.
    const METHODS: &'static [MethodDescriptor];

    /// Looks up a method descriptor by name.
    #[must_use]
    fn method(name: &str) -> Option<&'static MethodDescriptor> {
        Self::METHODS.iter().find(|method| method.name == name)
    }

    /// Name written on constructor blocks: [`NAME`](Self::NAME) when it
    /// reads as a role identifier, otherwise the implementing type's name.
    #[must_use]
    fn role_name() -> String {
        if looks_like_role(Self::NAME) {
            Self::NAME.to_string()
        } else {
            short_type_name::<Self>()
        }
    }
}

fn looks_like_role(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
