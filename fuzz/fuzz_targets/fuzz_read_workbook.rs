#![no_main]

use libfuzzer_sys::fuzz_target;

/// Templates are small; large inputs only slow the fuzzer down.
const MAX_INPUT_BYTES: usize = 1024 * 1024;

fuzz_target!(|data: &[u8]| {
    if data.len() > MAX_INPUT_BYTES {
        return;
    }

    // Any workbook that reads must also write.
    if let Ok(workbook) = report_xlsx::read_workbook_from_bytes(data) {
        let _ = report_xlsx::write_workbook_to_bytes(&workbook);
    }
});
