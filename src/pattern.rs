//! The self-describing on-disk block format: four 64-byte ASCII header
//! sections followed by a deterministic fill pattern.
//!
//! A reader that only has this module and a file descriptor can recover
//! block size and file size from any valid block, and can tell whether a
//! block's payload was corrupted, without consulting any external metadata.

use chrono::{Datelike, Local, Timelike};
use rand::Rng;
use std::cell::RefCell;
use std::path::Path;
use std::time::SystemTime;

const SECTION_WIDTH: usize = 64;
pub const HEADER_SIZE: usize = 4 * SECTION_WIDTH;
const TAG_LEN: usize = 5;

const RUN_TAG: &[u8; TAG_LEN] = b"#RUN ";
const DIR_TAG: &[u8; TAG_LEN] = b"#DIR ";
const FIL_TAG: &[u8; TAG_LEN] = b"#FIL ";
const BLK_TAG: &[u8; TAG_LEN] = b"#BLK ";

const MIN_BSIZE: u64 = 256;
const MAX_BSIZE: u64 = 2 * 1024 * 1024;
const MIN_BLOCKS: u64 = 10;
const MAX_BLOCKS: u64 = 2048;
const MAX_FSIZE: u64 = 64 * 1024 * 1024;

// 64 bytes of pattern data, written 63 bytes at a time between newlines.
const PATTERN: &[u8; 64] =
    b"123456789 abcdefghijklmnopqrstuvwxyz ABCDEFGHIJKLMNOPQRSTUVWXYZ ";

thread_local! {
    static RNG: RefCell<rand::rngs::SmallRng> = RefCell::new({
        use rand::SeedableRng;
        let seed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        rand::rngs::SmallRng::seed_from_u64(seed)
    });
}

/// Write `content` into a 64-byte section, space-pad it, and terminate it
/// with a newline at byte 63 (truncating `content` if it would overrun).
fn linepad(section: &mut [u8], content: &[u8]) {
    debug_assert_eq!(section.len(), SECTION_WIDTH);
    let n = content.len().min(SECTION_WIDTH - 1);
    section[..n].copy_from_slice(&content[..n]);
    for b in &mut section[n..SECTION_WIDTH - 1] {
        *b = b' ';
    }
    section[SECTION_WIDTH - 1] = b'\n';
}

fn section_mut(buf: &mut [u8], which: usize) -> &mut [u8] {
    &mut buf[which * SECTION_WIDTH..(which + 1) * SECTION_WIDTH]
}

fn section(buf: &[u8], which: usize) -> &[u8] {
    &buf[which * SECTION_WIDTH..(which + 1) * SECTION_WIDTH]
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write the `#RUN` section: today's date/time plus the run tag.
pub fn run_header(buf: &mut [u8], tag: &str) {
    let now = Local::now();
    let text = format!(
        "#RUN date={:02}/{:02}/{:04} time={:02}:{:02}:{:02} tag={}",
        now.month(),
        now.day(),
        now.year(),
        now.hour(),
        now.minute(),
        now.second(),
        tag
    );
    linepad(section_mut(buf, 0), text.as_bytes());
}

/// Write the `#DIR` section: the thread's working directory.
pub fn thread_header(buf: &mut [u8], dir: &str) {
    let text = format!("#DIR dir={dir}");
    linepad(section_mut(buf, 1), text.as_bytes());
}

/// Write the `#FIL` section: the file's basename and intended length.
pub fn file_header(buf: &mut [u8], path: &Path, len: u64) {
    let text = format!("#FIL name={} length={}", basename(path), len);
    linepad(section_mut(buf, 2), text.as_bytes());
}

/// Write the `#BLK` section: this block's size and file offset.
pub fn block_header(buf: &mut [u8], bsize: u64, offset: u64) {
    let text = format!("#BLK bsize={bsize} offset={offset}");
    linepad(section_mut(buf, 3), text.as_bytes());
}

/// Fill `buf[HEADER_SIZE..bsize]` with the deterministic rolling pattern.
///
/// Called once per buffer, at buffer-initialization time: the payload
/// region is never rewritten again, which is what makes verification
/// succeed after any random-rewrite workload (only `#BLK` changes between
/// writes of the same buffer).
pub fn fill_data(buf: &mut [u8], bsize: usize) {
    let mut x: usize = 0;
    for i in HEADER_SIZE..bsize {
        buf[i] = if i % 64 == 63 {
            b'\n'
        } else {
            let b = PATTERN[x % 64];
            x += 1;
            b
        };
    }
}

/// Verify `buf[HEADER_SIZE..bsize]` matches the pattern [`fill_data`] would
/// have produced.
pub fn check_data(buf: &[u8], bsize: usize) -> Result<(), &'static str> {
    let mut x: usize = 0;
    for i in HEADER_SIZE..bsize.min(buf.len()) {
        let expect = if i % 64 == 63 {
            b'\n'
        } else {
            let b = PATTERN[x % 64];
            x += 1;
            b
        };
        if buf[i] != expect {
            return Err("incorrect pattern data");
        }
    }
    Ok(())
}

fn parse_u64_after(haystack: &str, marker: &str) -> Option<u64> {
    let pos = haystack.find(marker)? + marker.len();
    let rest = &haystack[pos..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn section_str(buf: &[u8], which: usize) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(section(buf, which))
}

/// Confirm every section is present, newline-terminated, and that the
/// `#BLK` section matches the expected block size (when nonzero) and
/// offset.
pub fn check_headers(
    buf: &[u8],
    expected_bsize: u64,
    expected_offset: u64,
) -> Result<(), &'static str> {
    if &section(buf, 0)[..TAG_LEN] != RUN_TAG {
        return Err("No RUN header");
    }
    if &section(buf, 1)[..TAG_LEN] != DIR_TAG {
        return Err("No DIR header");
    }
    if &section(buf, 2)[..TAG_LEN] != FIL_TAG {
        return Err("No FILE header");
    }
    if &section(buf, 3)[..TAG_LEN] != BLK_TAG {
        return Err("No BLOCK header");
    }

    if section(buf, 0)[SECTION_WIDTH - 1] != b'\n' {
        return Err("un-terminated RUN header");
    }
    if section(buf, 1)[SECTION_WIDTH - 1] != b'\n' {
        return Err("un-terminated DIR header");
    }
    if section(buf, 2)[SECTION_WIDTH - 1] != b'\n' {
        return Err("un-terminated FILE header");
    }
    if section(buf, 3)[SECTION_WIDTH - 1] != b'\n' {
        return Err("un-terminated BLOCK header");
    }

    let blk = section_str(buf, 3);
    let this_bsize = parse_u64_after(&blk, "bsize=").ok_or("mal-formatted BLOCK header")?;
    let this_offset = parse_u64_after(&blk, "offset=").ok_or("mal-formatted BLOCK header")?;
    if expected_bsize != 0 && this_bsize != expected_bsize {
        return Err("block-size mis-match");
    }
    if this_offset != expected_offset {
        return Err("offset mis-match");
    }

    Ok(())
}

/// Reparse the block size from the `#BLK` section (0 if unparseable).
pub fn get_block_size(buf: &[u8]) -> u64 {
    parse_u64_after(&section_str(buf, 3), "bsize=").unwrap_or(0)
}

/// Reparse the file size from the `#FIL` section (0 if unparseable).
pub fn get_file_size(buf: &[u8]) -> u64 {
    parse_u64_after(&section_str(buf, 2), "length=").unwrap_or(0)
}

/// Confirm the file this buffer was read from is the one the header
/// describes: name must match, and the on-disk size must equal the
/// stored length exactly.
pub fn check_file(buf: &[u8], path: &Path) -> Result<(), &'static str> {
    let run = section_str(buf, 0);
    if !run.contains("date=") || !run.contains("time=") {
        return Err("mal-formatted RUN header");
    }

    let fil = section_str(buf, 2);
    let name_pos = fil.find("name=").ok_or("mal-formatted FILE header")? + "name=".len();
    let rest = &fil[name_pos..];
    let len_marker = " length=";
    let len_at = rest.find(len_marker).ok_or("mal-formatted FILE header")?;
    let stored_name = &rest[..len_at];
    let stored_len: u64 = parse_u64_after(&fil, "length=").ok_or("mal-formatted FILE header")?;

    if stored_name != basename(path) {
        return Err("file name mis-match");
    }

    let meta = std::fs::metadata(path).map_err(|_| "unable to stat")?;
    if meta.len() > stored_len {
        return Err("file too long");
    }
    if meta.len() < stored_len {
        return Err("file too short");
    }

    Ok(())
}

/// Largest supported block size.
pub fn max_bsize() -> u64 {
    MAX_BSIZE
}

/// Choose a random power-of-two block size between `max(256, alignment)`
/// and `maxsize` inclusive.
pub fn choose_bsize(alignment: u64, maxsize: u64) -> u64 {
    let min_bsize = MIN_BSIZE.max(alignment.max(1));
    let mut max_double = 0u32;
    let mut size = min_bsize;
    while size < maxsize.max(min_bsize) {
        max_double += 1;
        size <<= 1;
    }
    let k = RNG.with(|r| r.borrow_mut().gen_range(0..=max_double));
    min_bsize << k
}

/// Choose a random block index in `[0, num_blocks)`, clamping
/// `num_blocks` to at least 1 to avoid a zero-size divisor (see
/// SPEC_FULL.md §9).
pub fn choose_block(num_blocks: u64) -> u64 {
    let n = num_blocks.max(1);
    RNG.with(|r| r.borrow_mut().gen_range(0..n))
}

/// Choose a random file size of 10..=2048 blocks of `bsize`, capped at 64 MiB.
pub fn choose_file_size(bsize: u64) -> u64 {
    let bsize = bsize.max(1);
    let max_blocks = (MAX_FSIZE / bsize).min(MAX_BLOCKS).max(MIN_BLOCKS + 1);
    let extra = RNG.with(|r| r.borrow_mut().gen_range(0..max_blocks - MIN_BLOCKS));
    (MIN_BLOCKS + extra) * bsize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn make_buf(bsize: usize, tag: &str, dir: &str, path: &Path, len: u64, offset: u64) -> Vec<u8> {
        let mut buf = vec![0u8; bsize];
        run_header(&mut buf, tag);
        thread_header(&mut buf, dir);
        file_header(&mut buf, path, len);
        block_header(&mut buf, bsize as u64, offset);
        fill_data(&mut buf, bsize);
        buf
    }

    #[test]
    fn round_trip_headers_and_data() {
        let bsize = 4096usize;
        let path = PathBuf::from("FILE_000001");
        let buf = make_buf(bsize, "host1", "/tmp/x", &path, 65536, 0);

        assert!(check_headers(&buf, bsize as u64, 0).is_ok());
        assert!(check_data(&buf, bsize).is_ok());
        assert_eq!(get_block_size(&buf), bsize as u64);
        assert_eq!(get_file_size(&buf), 65536);
    }

    #[test]
    fn offset_independence_of_payload() {
        let bsize = 512usize;
        let path = PathBuf::from("FILE_000001");
        let buf1 = make_buf(bsize, "t", "/tmp/x", &path, 4096, 0);
        let buf2 = make_buf(bsize, "t", "/tmp/x", &path, 4096, 4096);

        // only #BLK (section 3) differs; payload is identical
        assert_eq!(&buf1[..3 * 64], &buf2[..3 * 64]);
        assert_eq!(&buf1[256..], &buf2[256..]);
    }

    #[test]
    fn detects_corrupted_payload() {
        let bsize = 1024usize;
        let path = PathBuf::from("FILE_000001");
        let mut buf = make_buf(bsize, "t", "/tmp/x", &path, 4096, 0);
        buf[300] ^= 0xFF;
        assert_eq!(check_data(&buf, bsize), Err("incorrect pattern data"));
    }

    #[test]
    fn detects_block_size_mismatch() {
        let bsize = 1024usize;
        let path = PathBuf::from("FILE_000001");
        let buf = make_buf(bsize, "t", "/tmp/x", &path, 4096, 0);
        assert_eq!(check_headers(&buf, 2048, 0), Err("block-size mis-match"));
    }

    #[test]
    fn detects_offset_mismatch() {
        let bsize = 1024usize;
        let path = PathBuf::from("FILE_000001");
        let buf = make_buf(bsize, "t", "/tmp/x", &path, 4096, 0);
        assert_eq!(check_headers(&buf, bsize as u64, 128), Err("offset mis-match"));
    }

    #[test]
    fn check_file_validates_name_and_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FILE_000001");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let mut buf = vec![0u8; 4096];
        run_header(&mut buf, "t");
        thread_header(&mut buf, dir.path().to_str().unwrap());
        file_header(&mut buf, &path, 4096);
        block_header(&mut buf, 4096, 0);

        assert!(check_file(&buf, &path).is_ok());
    }

    #[test]
    fn check_file_rejects_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FILE_000001");
        std::fs::write(&path, vec![0u8; 100]).unwrap();

        let mut buf = vec![0u8; 4096];
        run_header(&mut buf, "t");
        thread_header(&mut buf, dir.path().to_str().unwrap());
        file_header(&mut buf, &path, 4096);
        block_header(&mut buf, 4096, 0);

        assert_eq!(check_file(&buf, &path), Err("file too short"));
    }

    #[test]
    fn choose_bsize_is_power_of_two_in_range() {
        for _ in 0..100 {
            let b = choose_bsize(0, max_bsize());
            assert!(b >= 256 && b <= max_bsize());
            assert_eq!(b & (b - 1), 0, "{b} is not a power of two");
        }
    }

    #[test]
    fn choose_bsize_respects_alignment_floor() {
        for _ in 0..50 {
            let b = choose_bsize(8192, max_bsize());
            assert!(b >= 8192);
        }
    }

    #[test]
    fn choose_block_is_in_range() {
        for _ in 0..100 {
            assert!(choose_block(10) < 10);
        }
        // degenerate file (num_blocks=0) must not divide by zero
        assert_eq!(choose_block(0), 0);
    }

    #[test]
    fn choose_file_size_is_bounded() {
        for _ in 0..50 {
            let fsize = choose_file_size(4096);
            assert!(fsize >= 10 * 4096);
            assert!(fsize <= 64 * 1024 * 1024);
        }
    }

    #[test]
    fn missing_headers_reported() {
        let buf = vec![0u8; 1024];
        assert_eq!(check_headers(&buf, 0, 0), Err("No RUN header"));
    }
}
