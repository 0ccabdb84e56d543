use std::sync::OnceLock;

const FALLBACK_PAGE_SIZE: usize = 4096;

pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions and only reads process state.
        let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if n > 0 {
            n as usize
        } else {
            FALLBACK_PAGE_SIZE
        }
    })
}

/// The next multiple of `page` strictly above `n`. An already-aligned `n`
/// still gains a whole page, as the host's own writer does.
pub fn round_up_to(n: usize, page: usize) -> usize {
    n + (page - n % page)
}

pub fn round_up_to_page(n: usize) -> usize {
    round_up_to(n, page_size())
}
