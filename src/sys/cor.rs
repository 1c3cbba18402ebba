// callsite-rewriter/src/sys/cor.rs
//
// Metadata token kinds, profiler module flags and the handful of HRESULTs the
// profiler boundary needs. Values follow corhdr.h / corprof.h from the
// CoreCLR sources.
//
// A metadata token is a 32-bit value: the high byte names the table, the low
// 24 bits are the 1-based row id. Row id 0 is the nil token for that table.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

pub type mdToken = u32;
pub type HRESULT = i32;
pub type ModuleID = usize;

// --- Token types (CorTokenType) ---
pub const mdtModule: mdToken = 0x0000_0000;
pub const mdtTypeRef: mdToken = 0x0100_0000;
pub const mdtTypeDef: mdToken = 0x0200_0000;
pub const mdtFieldDef: mdToken = 0x0400_0000;
pub const mdtMethodDef: mdToken = 0x0600_0000;
pub const mdtParamDef: mdToken = 0x0800_0000;
pub const mdtInterfaceImpl: mdToken = 0x0900_0000;
pub const mdtMemberRef: mdToken = 0x0A00_0000;
pub const mdtCustomAttribute: mdToken = 0x0C00_0000;
pub const mdtPermission: mdToken = 0x0E00_0000;
pub const mdtSignature: mdToken = 0x1100_0000;
pub const mdtEvent: mdToken = 0x1400_0000;
pub const mdtProperty: mdToken = 0x1700_0000;
pub const mdtModuleRef: mdToken = 0x1A00_0000;
pub const mdtTypeSpec: mdToken = 0x1B00_0000;
pub const mdtAssembly: mdToken = 0x2000_0000;
pub const mdtAssemblyRef: mdToken = 0x2300_0000;
pub const mdtFile: mdToken = 0x2600_0000;
pub const mdtExportedType: mdToken = 0x2700_0000;
pub const mdtManifestResource: mdToken = 0x2800_0000;
pub const mdtGenericParam: mdToken = 0x2A00_0000;
pub const mdtMethodSpec: mdToken = 0x2B00_0000;
pub const mdtGenericParamConstraint: mdToken = 0x2C00_0000;
pub const mdtString: mdToken = 0x7000_0000;
pub const mdtName: mdToken = 0x7100_0000;
pub const mdtBaseType: mdToken = 0x7200_0000;

pub const mdTokenNil: mdToken = 0;

#[inline]
pub const fn TypeFromToken(tk: mdToken) -> mdToken {
    tk & 0xFF00_0000
}

#[inline]
pub const fn RidFromToken(tk: mdToken) -> u32 {
    tk & 0x00FF_FFFF
}

#[inline]
pub const fn TokenFromRid(rid: u32, tktype: mdToken) -> mdToken {
    rid | tktype
}

// --- COR_PRF_MODULE_FLAGS ---
pub const COR_PRF_MODULE_DISK: u32 = 0x0001;
pub const COR_PRF_MODULE_NGEN: u32 = 0x0002;
pub const COR_PRF_MODULE_DYNAMIC: u32 = 0x0004;
pub const COR_PRF_MODULE_COLLECTIBLE: u32 = 0x0008;
pub const COR_PRF_MODULE_RESOURCE: u32 = 0x0010;
pub const COR_PRF_MODULE_FLAT_LAYOUT: u32 = 0x0020;
pub const COR_PRF_MODULE_WINDOWS_RUNTIME: u32 = 0x0200;

// --- CorOpenFlags ---
pub const ofRead: u32 = 0x0000_0000;
pub const ofWrite: u32 = 0x0000_0001;
pub const ofReadWriteMask: u32 = 0x0000_0001;

// --- HRESULTs ---
pub const S_OK: HRESULT = 0;
pub const S_FALSE: HRESULT = 1;
pub const E_FAIL: HRESULT = 0x8000_4005_u32 as HRESULT;
pub const E_INVALIDARG: HRESULT = 0x8007_0057_u32 as HRESULT;
pub const E_NOTIMPL: HRESULT = 0x8000_4001_u32 as HRESULT;
pub const E_OUTOFMEMORY: HRESULT = 0x8007_000E_u32 as HRESULT;
pub const CLDB_E_RECORD_NOTFOUND: HRESULT = 0x8013_1130_u32 as HRESULT;
pub const CLDB_E_FILE_READONLY: HRESULT = 0x8013_1105_u32 as HRESULT;
pub const META_E_BAD_SIGNATURE: HRESULT = 0x8013_1192_u32 as HRESULT;
pub const CORPROF_E_DATAINCOMPLETE: HRESULT = 0x8013_1351_u32 as HRESULT;

#[inline]
pub const fn SUCCEEDED(hr: HRESULT) -> bool {
    hr >= 0
}

#[inline]
pub const fn FAILED(hr: HRESULT) -> bool {
    hr < 0
}
