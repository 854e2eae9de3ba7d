use std::ffi::OsString;

fn main() {
    let args: Vec<OsString> = std::env::args_os().collect();
    if let Err(err) = sift_core::run(args) {
        eprintln!("sift: {err:#}");
        std::process::exit(1);
    }
}
