//! Typed view over a module's metadata tables.
//!
//! The host shim implements [`MetadataImport`] and [`MetadataEmit`] on top of
//! `IMetaDataImport` / `IMetaDataEmit` / `IMetaDataAssemblyEmit`. Everything
//! above this module speaks [`Token`] and these traits only.
//!
//! # Name buffers
//!
//! The read methods write names into a caller-owned `String` instead of
//! returning owned strings. The call-site scanner keeps one pair of buffers
//! for a whole method, so after the buffers have grown to fit the longest
//! name, resolution does not allocate.

use std::fmt;

use crate::error::HostError;
use crate::integration::AssemblyRef;
use crate::sys::cor;

/// A 32-bit metadata token: table kind in the high byte, row id below.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Token(pub cor::mdToken);

impl Token {
    pub const NIL: Token = Token(cor::mdTokenNil);

    pub const fn new(kind: TokenKind, rid: u32) -> Self {
        Token(cor::TokenFromRid(rid, kind as cor::mdToken))
    }

    pub const fn raw(self) -> cor::mdToken {
        self.0
    }

    pub const fn rid(self) -> u32 {
        cor::RidFromToken(self.0)
    }

    pub const fn is_nil(self) -> bool {
        self.rid() == 0
    }

    pub fn kind(self) -> TokenKind {
        TokenKind::from_raw(cor::TypeFromToken(self.0))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:#x})", self.kind(), self.rid())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Metadata table named by a token's high byte.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Module = cor::mdtModule,
    TypeRef = cor::mdtTypeRef,
    TypeDef = cor::mdtTypeDef,
    FieldDef = cor::mdtFieldDef,
    MethodDef = cor::mdtMethodDef,
    MemberRef = cor::mdtMemberRef,
    Signature = cor::mdtSignature,
    ModuleRef = cor::mdtModuleRef,
    TypeSpec = cor::mdtTypeSpec,
    AssemblyRef = cor::mdtAssemblyRef,
    MethodSpec = cor::mdtMethodSpec,
    String = cor::mdtString,
    Other = 0xFF00_0000,
}

impl TokenKind {
    fn from_raw(kind: cor::mdToken) -> Self {
        match kind {
            cor::mdtModule => TokenKind::Module,
            cor::mdtTypeRef => TokenKind::TypeRef,
            cor::mdtTypeDef => TokenKind::TypeDef,
            cor::mdtFieldDef => TokenKind::FieldDef,
            cor::mdtMethodDef => TokenKind::MethodDef,
            cor::mdtMemberRef => TokenKind::MemberRef,
            cor::mdtSignature => TokenKind::Signature,
            cor::mdtModuleRef => TokenKind::ModuleRef,
            cor::mdtTypeSpec => TokenKind::TypeSpec,
            cor::mdtAssemblyRef => TokenKind::AssemblyRef,
            cor::mdtMethodSpec => TokenKind::MethodSpec,
            cor::mdtString => TokenKind::String,
            _ => TokenKind::Other,
        }
    }
}

/// Host identity of a loaded module (`ModuleID`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub cor::ModuleID);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// `COR_PRF_MODULE_FLAGS` reported with a module load.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ModuleFlags(pub u32);

impl ModuleFlags {
    pub const WINDOWS_RUNTIME: ModuleFlags = ModuleFlags(cor::COR_PRF_MODULE_WINDOWS_RUNTIME);
    pub const DYNAMIC: ModuleFlags = ModuleFlags(cor::COR_PRF_MODULE_DYNAMIC);
    pub const RESOURCE: ModuleFlags = ModuleFlags(cor::COR_PRF_MODULE_RESOURCE);
    /// Not a CLR flag: set by the host shim when it could not open the
    /// metadata for writing.
    pub const READ_ONLY_METADATA: ModuleFlags = ModuleFlags(0x8000_0000);

    pub const fn contains(self, other: ModuleFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether writable metadata and IL rewriting are available for the module.
    pub const fn is_instrumentable(self) -> bool {
        !self.contains(Self::WINDOWS_RUNTIME)
            && !self.contains(Self::RESOURCE)
            && !self.contains(Self::READ_ONLY_METADATA)
    }
}

impl std::ops::BitOr for ModuleFlags {
    type Output = ModuleFlags;

    fn bitor(self, rhs: Self) -> Self {
        ModuleFlags(self.0 | rhs.0)
    }
}

/// Read side of a module's metadata.
pub trait MetadataImport {
    /// `GetMemberRefProps`: writes the member name, returns the parent token.
    fn member_ref_props(&self, member_ref: Token, name: &mut String) -> Result<Token, HostError>;

    /// `GetMethodProps`: writes the method name, returns the owning TypeDef.
    fn method_props(&self, method_def: Token, name: &mut String) -> Result<Token, HostError>;

    /// `GetTypeRefProps`: writes the (namespace-qualified) type name.
    fn type_ref_props(&self, type_ref: Token, name: &mut String) -> Result<(), HostError>;

    /// `GetTypeDefProps`: writes the (namespace-qualified) type name.
    fn type_def_props(&self, type_def: Token, name: &mut String) -> Result<(), HostError>;
}

/// Write side of a module's metadata.
///
/// Methods take `&self`: COM emit interfaces are internally synchronized and
/// the handle is shared between the load path and later compilations.
pub trait MetadataEmit {
    /// `DefineAssemblyRef`.
    fn define_assembly_ref(&self, assembly: &AssemblyRef) -> Result<Token, HostError>;

    /// `DefineTypeRefByName` with an AssemblyRef (or other) resolution scope.
    fn define_type_ref(&self, scope: Token, name: &str) -> Result<Token, HostError>;

    /// `DefineMemberRef` with a raw method signature blob.
    fn define_member_ref(&self, parent: Token, name: &str, signature: &[u8]) -> Result<Token, HostError>;
}

/// Read/write metadata handle for one module, as stored in a module record.
pub trait ModuleMetadata: MetadataImport + MetadataEmit + Send + Sync {}

impl<T> ModuleMetadata for T where T: MetadataImport + MetadataEmit + Send + Sync {}
