fn main() {
    scan_footprint::cli::run();
}
