fn main() -> std::process::ExitCode {
    s3sync_lib::run()
}
