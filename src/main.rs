fn main() -> anyhow::Result<()> {
    helmet_viewer::flow::run()
}
