//! Synthetic Mach-O images for tests.
//!
//! Images are laid out the way dyld would map them: the header sits at the
//! start of `__TEXT`, a `__text` section follows the load commands, and
//! `__LINKEDIT` (symbols, then strings) starts at file offset `LINKEDIT_OFF`
//! directly after `__TEXT`.

#![allow(dead_code)]

use object::macho::{
    CPU_TYPE_X86_64, LC_DYSYMTAB, LC_SEGMENT, LC_SEGMENT_64, LC_SYMTAB, LC_UUID, MH_EXECUTE,
    MH_MAGIC, MH_MAGIC_64, N_EXT, N_SECT,
};

pub const TEXT_SECTION_OFF: u64 = 0x200;
pub const TEXT_SECTION_SIZE: u64 = 0x80;
pub const TEXT_FILL: u8 = 0xc3;
pub const LINKEDIT_OFF: u64 = 0x400;
pub const MH_FLAGS: u32 = 0x0020_0085;

/// One symbol to place in the image.
#[derive(Debug, Clone)]
pub struct Sym {
    pub name: String,
    /// Link-time value.
    pub value: u64,
    pub external: bool,
    pub n_type: u8,
    pub n_desc: u16,
}

impl Sym {
    pub fn global(name: &str, value: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
            external: true,
            n_type: N_SECT | N_EXT,
            n_desc: 0,
        }
    }

    pub fn local(name: &str, value: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
            external: false,
            n_type: N_SECT,
            n_desc: 0,
        }
    }

    pub fn with_type(mut self, n_type: u8) -> Self {
        self.n_type = n_type;
        self
    }

    pub fn with_desc(mut self, n_desc: u16) -> Self {
        self.n_desc = n_desc;
        self
    }
}

/// Builder for a complete image.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    pub m64: bool,
    pub swapped: bool,
    pub cpu_type: u32,
    pub cpu_subtype: u32,
    pub text_vmaddr: u64,
    pub text_vmsize: u64,
    pub with_text: bool,
    pub with_symtab: bool,
    pub two_level: bool,
    pub uuid: Option<[u8; 16]>,
    pub symbols: Vec<Sym>,
    pub sizeofcmds_override: Option<u32>,
    /// (ilocalsym, nlocalsym, iextdefsym, nextdefsym)
    pub dysymtab_override: Option<(u32, u32, u32, u32)>,
    pub stroff_override: Option<u32>,
}

impl ImageBuilder {
    pub fn new(m64: bool) -> Self {
        Self {
            m64,
            swapped: false,
            cpu_type: CPU_TYPE_X86_64,
            cpu_subtype: 3,
            text_vmaddr: if m64 { 0x1_0000_0000 } else { 0x1000 },
            text_vmsize: 0x4000,
            with_text: true,
            with_symtab: true,
            two_level: true,
            uuid: None,
            symbols: Vec::new(),
            sizeofcmds_override: None,
            dysymtab_override: None,
            stroff_override: None,
        }
    }

    pub fn swapped(mut self, swapped: bool) -> Self {
        self.swapped = swapped;
        self
    }

    pub fn symbol(mut self, sym: Sym) -> Self {
        self.symbols.push(sym);
        self
    }

    /// Ordered as a linker emits them: locals, then external definitions.
    fn ordered_symbols(&self) -> (Vec<&Sym>, usize) {
        let locals: Vec<&Sym> = self.symbols.iter().filter(|s| !s.external).collect();
        let nlocal = locals.len();
        let mut all = locals;
        all.extend(self.symbols.iter().filter(|s| s.external));
        (all, nlocal)
    }

    fn seg_size(&self) -> u32 {
        if self.m64 {
            72
        } else {
            56
        }
    }

    fn sect_size(&self) -> u32 {
        if self.m64 {
            80
        } else {
            68
        }
    }

    pub fn header_size(&self) -> u64 {
        if self.m64 {
            32
        } else {
            28
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let (symbols, nlocal) = self.ordered_symbols();
        let nlist_size: u64 = if self.m64 { 16 } else { 12 };

        let mut strtab = vec![b' ', 0];
        let mut strx = Vec::new();
        for sym in &symbols {
            strx.push(strtab.len() as u32);
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
        }
        while strtab.len() % 8 != 0 {
            strtab.push(0);
        }

        let symoff = LINKEDIT_OFF;
        let stroff = symoff + symbols.len() as u64 * nlist_size;
        let linkedit_size = stroff - symoff + strtab.len() as u64;

        let mut cmds = Writer::new(self.swapped);
        let mut ncmds = 0;

        let (seg_cmd, first_seg) = if self.m64 {
            (LC_SEGMENT_64, if self.with_text { "__TEXT" } else { "__DATA" })
        } else {
            (LC_SEGMENT, if self.with_text { "__TEXT" } else { "__DATA" })
        };

        // __TEXT (or a stand-in) with one __text section
        cmds.u32(seg_cmd);
        cmds.u32(self.seg_size() + self.sect_size());
        cmds.name(first_seg);
        cmds.addr(self.m64, self.text_vmaddr);
        cmds.addr(self.m64, self.text_vmsize);
        cmds.addr(self.m64, 0);
        cmds.addr(self.m64, LINKEDIT_OFF);
        cmds.u32(5);
        cmds.u32(5);
        cmds.u32(1);
        cmds.u32(0);
        cmds.name("__text");
        cmds.name(first_seg);
        cmds.addr(self.m64, self.text_vmaddr + TEXT_SECTION_OFF);
        cmds.addr(self.m64, TEXT_SECTION_SIZE);
        cmds.u32(TEXT_SECTION_OFF as u32);
        cmds.u32(4);
        cmds.u32(0);
        cmds.u32(0);
        cmds.u32(0x8000_0400);
        cmds.u32(0);
        cmds.u32(0);
        if self.m64 {
            cmds.u32(0);
        }
        ncmds += 1;

        // __LINKEDIT
        cmds.u32(seg_cmd);
        cmds.u32(self.seg_size());
        cmds.name("__LINKEDIT");
        cmds.addr(self.m64, self.text_vmaddr + LINKEDIT_OFF);
        cmds.addr(self.m64, linkedit_size);
        cmds.addr(self.m64, LINKEDIT_OFF);
        cmds.addr(self.m64, linkedit_size);
        cmds.u32(1);
        cmds.u32(1);
        cmds.u32(0);
        cmds.u32(0);
        ncmds += 1;

        if self.with_symtab {
            cmds.u32(LC_SYMTAB);
            cmds.u32(24);
            cmds.u32(symoff as u32);
            cmds.u32(symbols.len() as u32);
            cmds.u32(self.stroff_override.unwrap_or(stroff as u32));
            cmds.u32(strtab.len() as u32);
            ncmds += 1;
        }

        if self.two_level {
            let nsyms = symbols.len() as u32;
            let (ilocal, nlocal, iext, next) = self.dysymtab_override.unwrap_or((
                0,
                nlocal as u32,
                nlocal as u32,
                nsyms - nlocal as u32,
            ));
            cmds.u32(LC_DYSYMTAB);
            cmds.u32(80);
            cmds.u32(ilocal);
            cmds.u32(nlocal);
            cmds.u32(iext);
            cmds.u32(next);
            cmds.u32(nsyms);
            cmds.u32(0);
            for _ in 0..12 {
                cmds.u32(0);
            }
            ncmds += 1;
        }

        if let Some(uuid) = self.uuid {
            cmds.u32(LC_UUID);
            cmds.u32(24);
            cmds.bytes(&uuid);
            ncmds += 1;
        }

        let sizeofcmds = cmds.buf.len() as u32;
        assert!(self.header_size() + u64::from(sizeofcmds) <= TEXT_SECTION_OFF);

        let mut out = Writer::new(self.swapped);
        out.u32(if self.m64 { MH_MAGIC_64 } else { MH_MAGIC });
        out.u32(self.cpu_type);
        out.u32(self.cpu_subtype);
        out.u32(MH_EXECUTE);
        out.u32(ncmds);
        out.u32(self.sizeofcmds_override.unwrap_or(sizeofcmds));
        out.u32(MH_FLAGS);
        if self.m64 {
            out.u32(0);
        }
        out.bytes(&cmds.buf);

        out.buf.resize(TEXT_SECTION_OFF as usize, 0);
        out.buf
            .resize((TEXT_SECTION_OFF + TEXT_SECTION_SIZE) as usize, TEXT_FILL);
        out.buf.resize(LINKEDIT_OFF as usize, 0);

        for (sym, &strx) in symbols.iter().zip(&strx) {
            out.u32(strx);
            out.buf.push(sym.n_type);
            out.buf.push(1);
            out.u16(sym.n_desc);
            out.addr(self.m64, sym.value);
        }
        out.bytes(&strtab);
        out.buf
    }
}

/// Field writer honoring the image's byte order.
struct Writer {
    buf: Vec<u8>,
    swapped: bool,
}

impl Writer {
    fn new(swapped: bool) -> Self {
        Self {
            buf: Vec::new(),
            swapped,
        }
    }

    fn u16(&mut self, v: u16) {
        let v = if self.swapped { v.swap_bytes() } else { v };
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    fn u32(&mut self, v: u32) {
        let v = if self.swapped { v.swap_bytes() } else { v };
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    fn u64(&mut self, v: u64) {
        let v = if self.swapped { v.swap_bytes() } else { v };
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    fn addr(&mut self, m64: bool, v: u64) {
        if m64 {
            self.u64(v);
        } else {
            self.u32(v as u32);
        }
    }

    fn name(&mut self, name: &str) {
        let mut field = [0u8; 16];
        field[..name.len()].copy_from_slice(name.as_bytes());
        self.buf.extend_from_slice(&field);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}
