use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => {
                let msg = format!("Unexpected leftover input '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self>;
}

/// How a value crosses a method boundary
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum EvaluationStrategy {
    ByValue,
    ByReference,
    BySharing,
}

impl EvaluationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStrategy::ByValue => "BY_VALUE",
            EvaluationStrategy::ByReference => "BY_REFERENCE",
            EvaluationStrategy::BySharing => "BY_SHARING",
        }
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    /// Spelled-out type name used on emitted nodes
    pub fn readable_name(&self) -> &'static str {
        match self {
            BaseType::Byte => "BYTE",
            BaseType::Char => "CHARACTER",
            BaseType::Double => "DOUBLE",
            BaseType::Float => "FLOAT",
            BaseType::Int => "INTEGER",
            BaseType::Long => "LONG",
            BaseType::Short => "SHORT",
            BaseType::Boolean => "BOOLEAN",
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => {
                let msg = format!("Invalid base type character '{}'", c);
                return Err(Error::new(ErrorKind::InvalidInput, msg));
            }
            None => {
                let msg = "Missing base type character";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
        };
        Ok(typ)
    }
}

/// Array type
///
/// The element type is never itself an array (`A[][]` is two additional
/// dimensions over `A`, not one dimension over `A[]`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: Box<FieldType>,
}

impl ArrayType {
    /// Total number of dimensions in the array type
    ///
    /// This is always just `additional_dimensions + 1`
    pub const fn dimensions(&self) -> usize {
        self.additional_dimensions + 1
    }
}

impl RenderDescriptor for ArrayType {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

/// Type of a parameter, return value, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(ArrayType),
}

impl FieldType {
    pub fn array(field_type: FieldType) -> FieldType {
        match field_type {
            FieldType::Array(arr) => FieldType::Array(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
            other => FieldType::Array(ArrayType {
                additional_dimensions: 0,
                element_type: Box::new(other),
            }),
        }
    }

    pub fn object(class_name: &str) -> FieldType {
        FieldType::Object(class_name.to_owned())
    }

    /// Spelled-out type name used on emitted nodes (`I` becomes `INTEGER`,
    /// `Ljava/lang/String;` becomes `java/lang/String`, arrays append `[]`
    /// per dimension)
    pub fn readable_name(&self) -> String {
        match self {
            FieldType::Base(base) => base.readable_name().to_owned(),
            FieldType::Object(class_name) => class_name.clone(),
            FieldType::Array(arr) => {
                let mut name = arr.element_type.readable_name();
                for _ in 0..arr.dimensions() {
                    name.push_str("[]");
                }
                name
            }
        }
    }

    /// How a value of this type crosses the method boundary
    pub fn evaluation_strategy(&self, is_method_return: bool) -> EvaluationStrategy {
        match self {
            FieldType::Base(_) => EvaluationStrategy::ByValue,
            FieldType::Object(_) | FieldType::Array(_) if is_method_return => {
                EvaluationStrategy::BySharing
            }
            FieldType::Object(_) | FieldType::Array(_) => EvaluationStrategy::ByReference,
        }
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Object(class_name) => {
                write_to.push('L');
                write_to.push_str(class_name);
                write_to.push(';');
            }
            FieldType::Array(arr) => arr.render_to(write_to),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.peek().copied() {
            None => Err(Error::new(ErrorKind::UnexpectedEof, "Missing field type")),
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L') => {
                source.next();
                let mut class_name = String::new();
                loop {
                    let c: char = source.next().ok_or_else(|| {
                        let msg = format!("Missing terminator for 'L{}'", class_name);
                        Error::new(ErrorKind::UnexpectedEof, msg)
                    })?;
                    if c == ';' {
                        return Ok(FieldType::Object(class_name));
                    } else {
                        class_name.push(c);
                    }
                }
            }
            Some('[') => {
                let mut additional_dimensions = 0;
                while source.next_if_eq(&'[').is_some() {
                    additional_dimensions += 1;
                }
                Ok(FieldType::Array(ArrayType {
                    additional_dimensions: additional_dimensions - 1,
                    element_type: Box::new(FieldType::parse_from(source)?),
                }))
            }
            Some(c) => {
                let msg = format!("Invalid field type character '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>, // `None` is for `void` (ie. no return)
}

impl MethodDescriptor {
    /// Spelled-out name of the return type (`VOID` for `None`)
    pub fn return_name(&self) -> String {
        match &self.return_type {
            None => String::from("VOID"),
            Some(typ) => typ.readable_name(),
        }
    }

    /// How the returned value crosses the method boundary
    pub fn return_strategy(&self) -> EvaluationStrategy {
        match &self.return_type {
            None => EvaluationStrategy::ByValue,
            Some(typ) => typ.evaluation_strategy(true),
        }
    }

    /// Rendered descriptor of just the return type (`V` for `None`)
    pub fn return_descriptor(&self) -> String {
        match &self.return_type {
            None => String::from("V"),
            Some(typ) => typ.render(),
        }
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        // Assert open paren
        if let Some('(') = source.next() {
        } else {
            let msg = "Expected '(' for method";
            return Err(Error::new(ErrorKind::InvalidInput, msg));
        }

        // Parse parameters
        let mut parameters = vec![];
        while source.peek().copied() != Some(')') {
            if source.peek().is_none() {
                let msg = "Expected ')' for method";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
            parameters.push(FieldType::parse_from(source)?);
        }

        // Assert close paren
        let _ = source.next();

        // Parse return
        let return_type = if let Some('V') = source.peek().copied() {
            let _ = source.next();
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}
