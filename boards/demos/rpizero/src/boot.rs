//! Startup shim.
//!
//! The GPU firmware drops `kernel.img` at `0x8000` and jumps to it with
//! the MMU and caches off. Stack grows down from the load address; the
//! bss must be zeroed by hand before any Rust runs.

core::arch::global_asm!(
    r#"
.section .text._start
.globl _start
_start:
    ldr     r0, =_start
    mov     sp, r0
    ldr     r0, =__bss_start
    ldr     r1, =__bss_end
    mov     r2, #0
0:  cmp     r0, r1
    bhs     1f
    str     r2, [r0], #4
    b       0b
1:  bl      _start_rust
2:  wfe
    b       2b
"#
);

#[no_mangle]
pub unsafe extern "C" fn _start_rust() -> ! {
    crate::kernel_init()
}
