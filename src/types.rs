use std::fmt;

/// Static type lattice of the language.
///
/// `Object` is the top type, `Null` sits under every reference type, and
/// lists are covariant in their component type. The covariance is unsound in
/// the usual way and intentional; the language has no list mutation surface
/// that would expose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    String,
    Boolean,
    Object,
    Null,
    Void,
    List(Box<Type>),
}

impl Type {
    pub fn list_of(component: Type) -> Type {
        Type::List(Box::new(component))
    }

    /// Whether a value of type `other` can be bound where `self` is expected.
    pub fn assignable_from(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Object, Type::Void) => false,
            (Type::Object, _) => true,
            (Type::String, Type::Null) => true,
            (Type::List(_), Type::Null) => true,
            (Type::List(component), Type::List(other_component)) => {
                // An empty list literal types as list<null> and must fit any
                // list, including list<int>.
                **other_component == Type::Null || component.assignable_from(other_component)
            }
            _ => false,
        }
    }

    /// Component type of a list, if this is a list type.
    pub fn component(&self) -> Option<&Type> {
        match self {
            Type::List(component) => Some(component),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Int | Type::Boolean)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
            Type::Boolean => write!(f, "bool"),
            Type::Object => write!(f, "object"),
            Type::Null => write!(f, "null"),
            Type::Void => write!(f, "void"),
            Type::List(component) => write!(f, "list<{component}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_is_top() {
        for ty in [
            Type::Int,
            Type::String,
            Type::Boolean,
            Type::Null,
            Type::list_of(Type::Int),
        ] {
            assert!(Type::Object.assignable_from(&ty), "object <- {ty}");
        }
        assert!(!Type::Object.assignable_from(&Type::Void));
    }

    #[test]
    fn null_assigns_to_reference_types_only() {
        assert!(Type::String.assignable_from(&Type::Null));
        assert!(Type::list_of(Type::Int).assignable_from(&Type::Null));
        assert!(!Type::Int.assignable_from(&Type::Null));
        assert!(!Type::Boolean.assignable_from(&Type::Null));
    }

    #[test]
    fn lists_are_covariant() {
        let list_int = Type::list_of(Type::Int);
        let list_object = Type::list_of(Type::Object);
        assert!(list_object.assignable_from(&list_int));
        assert!(!list_int.assignable_from(&list_object));
    }

    #[test]
    fn empty_list_type_fits_every_list() {
        let list_null = Type::list_of(Type::Null);
        assert!(Type::list_of(Type::Int).assignable_from(&list_null));
        assert!(Type::list_of(Type::String).assignable_from(&list_null));
    }

    #[test]
    fn displays_nested_lists() {
        assert_eq!(Type::list_of(Type::list_of(Type::Int)).to_string(), "list<list<int>>");
    }
}
