use bitflags::bitflags;

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

/// Modifier kinds emitted as MODIFIER nodes under a method
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Abstract,
    Native,
    Constructor,
    Virtual,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Public => "PUBLIC",
            Modifier::Private => "PRIVATE",
            Modifier::Protected => "PROTECTED",
            Modifier::Static => "STATIC",
            Modifier::Abstract => "ABSTRACT",
            Modifier::Native => "NATIVE",
            Modifier::Constructor => "CONSTRUCTOR",
            Modifier::Virtual => "VIRTUAL",
        }
    }
}

impl MethodAccessFlags {
    /// Modifier nodes for a method with these flags
    ///
    /// Methods are virtual unless something rules dynamic dispatch out
    /// (static, private, or final). The reserved name `<init>` marks a
    /// constructor.
    pub fn modifiers(&self, method_name: &str) -> Vec<Modifier> {
        let mut modifiers = vec![];
        let mut is_virtual = true;
        if method_name == "<init>" {
            modifiers.push(Modifier::Constructor);
        }
        if self.contains(MethodAccessFlags::STATIC) {
            modifiers.push(Modifier::Static);
            is_virtual = false;
        }
        if self.contains(MethodAccessFlags::PUBLIC) {
            modifiers.push(Modifier::Public);
        }
        if self.contains(MethodAccessFlags::PRIVATE) {
            modifiers.push(Modifier::Private);
            is_virtual = false;
        }
        if self.contains(MethodAccessFlags::PROTECTED) {
            modifiers.push(Modifier::Protected);
        }
        if self.contains(MethodAccessFlags::NATIVE) {
            modifiers.push(Modifier::Native);
        }
        if self.contains(MethodAccessFlags::ABSTRACT) {
            modifiers.push(Modifier::Abstract);
        }
        if self.contains(MethodAccessFlags::FINAL) {
            is_virtual = false;
        }
        if is_virtual {
            modifiers.push(Modifier::Virtual);
        }
        modifiers
    }
}
