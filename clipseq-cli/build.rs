include!("../build/git_metadata.rs");

fn main() {
    emit_git_metadata();
}
