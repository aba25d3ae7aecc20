fn main() -> anyhow::Result<()> {
    wpactl_cli::run()
}
