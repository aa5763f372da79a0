//! Metadata references carried as instruction operands.
//!
//! These are lightweight descriptions of the types and members an instruction
//! refers to. The buffer never interprets them beyond two things: rendering
//! them into the trace, and deriving the call shape of call-like instructions
//! for flow analysis.

use core::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::{String, ToString, Vec};

/// Parameter lists are short in practice; keep them inline.
pub type TypeList = SmallVec<[TypeRef; 4]>;

/// A reference to a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    name: String,
    is_value_type: bool,
}

impl TypeRef {
    /// A reference type such as `System.String`.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_value_type: false,
        }
    }

    /// A value type such as `System.Int32`.
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_value_type: true,
        }
    }

    /// `System.Void`, the return type of procedures and constructors.
    pub fn void() -> Self {
        Self::value("System.Void")
    }

    /// An unmanaged pointer to this type (`T*`).
    ///
    /// Pointers are not value types themselves, they are addresses.
    pub fn pointer_to(&self) -> Self {
        let mut name = self.name.clone();
        name.push('*');
        Self {
            name,
            is_value_type: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_value_type(&self) -> bool {
        self.is_value_type
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Writes `items` separated by `delimiter`.
pub(crate) fn write_joined<T: fmt::Display>(
    f: &mut dyn fmt::Write,
    delimiter: &str,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(delimiter)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// A reference to a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub return_type: TypeRef,
    pub parameters: TypeList,
    pub is_static: bool,
}

impl MethodRef {
    /// A static method.
    pub fn new_static(
        declaring_type: TypeRef,
        name: impl Into<String>,
        return_type: TypeRef,
        parameters: impl IntoIterator<Item = TypeRef>,
    ) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            return_type,
            parameters: parameters.into_iter().collect(),
            is_static: true,
        }
    }

    /// An instance method; the receiver is passed implicitly.
    pub fn new_instance(
        declaring_type: TypeRef,
        name: impl Into<String>,
        return_type: TypeRef,
        parameters: impl IntoIterator<Item = TypeRef>,
    ) -> Self {
        Self {
            is_static: false,
            ..Self::new_static(declaring_type, name, return_type, parameters)
        }
    }

    /// Parameter types as seen on the evaluation stack.
    ///
    /// Instance methods take their receiver first. A value-type receiver is
    /// passed by address, so it shows up as a pointer.
    pub fn stack_parameters(&self) -> Vec<TypeRef> {
        let mut params = Vec::with_capacity(self.parameters.len() + 1);
        if !self.is_static {
            let receiver = if self.declaring_type.is_value_type() {
                self.declaring_type.pointer_to()
            } else {
                self.declaring_type.clone()
            };
            params.push(receiver);
        }
        params.extend(self.parameters.iter().cloned());
        params
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        write_joined(f, ", ", &self.parameters)?;
        f.write_str(")")
    }
}

/// A reference to a constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorRef {
    pub declaring_type: TypeRef,
    pub parameters: TypeList,
}

impl ConstructorRef {
    pub fn new(declaring_type: TypeRef, parameters: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            declaring_type,
            parameters: parameters.into_iter().collect(),
        }
    }
}

impl fmt::Display for ConstructorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .ctor(", TypeRef::void())?;
        write_joined(f, ", ", &self.parameters)?;
        f.write_str(")")
    }
}

/// A reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub field_type: TypeRef,
    pub is_static: bool,
}

impl FieldRef {
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, field_type: TypeRef) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            field_type,
            is_static: false,
        }
    }

    pub fn new_static(
        declaring_type: TypeRef,
        name: impl Into<String>,
        field_type: TypeRef,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::new(declaring_type, name, field_type)
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field_type, self.name)
    }
}

bitflags! {
    /// Calling conventions of an indirect call signature.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct CallingConventions: u8 {
        const STANDARD = 0x01;
        const VAR_ARGS = 0x02;
        const ANY = Self::STANDARD.bits() | Self::VAR_ARGS.bits();
        const HAS_THIS = 0x20;
        const EXPLICIT_THIS = 0x40;
    }
}

impl fmt::Display for CallingConventions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        let mut rest = *self;
        if rest.contains(Self::ANY) {
            names.push("Any");
            rest.remove(Self::ANY);
        }
        for (flag, name) in [
            (Self::STANDARD, "Standard"),
            (Self::VAR_ARGS, "VarArgs"),
            (Self::HAS_THIS, "HasThis"),
            (Self::EXPLICIT_THIS, "ExplicitThis"),
        ] {
            if rest.contains(flag) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return f.write_str("0");
        }
        write_joined(f, ", ", names)
    }
}

/// Stand-alone signature of an indirect (`calli`) call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub conventions: CallingConventions,
    pub return_type: TypeRef,
    pub parameters: TypeList,
}

impl CallSite {
    pub fn new(
        conventions: CallingConventions,
        return_type: TypeRef,
        parameters: impl IntoIterator<Item = TypeRef>,
    ) -> Self {
        Self {
            conventions,
            return_type,
            parameters: parameters.into_iter().collect(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.conventions, self.return_type)?;
        write_joined(f, " ", &self.parameters)
    }
}

/// Escapes a string literal for single-quoted rendering.
pub(crate) fn escape_single_quoted(text: &str) -> String {
    if !text.contains('\'') {
        return text.to_string();
    }
    text.replace('\'', "\\'")
}
