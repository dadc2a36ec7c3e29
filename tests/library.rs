use anyhow::Result;
use oxtree::drag::PointerButton;
use oxtree::render::render_svg;
use oxtree::{
    EntryKind, LayoutConfig, LayoutEngine, LinkRenderer, PathEntry, PathTreeBuilder, Point,
    PositionStore, TreeSession, parse_entries,
};

fn sample_entries() -> Vec<PathEntry> {
    vec![PathEntry::blob("a/b.txt"), PathEntry::blob("a/c/d.txt")]
}

#[test]
fn builds_example_hierarchy() {
    let hierarchy = PathTreeBuilder::from_entries("repo", &sample_entries());
    let a = hierarchy.find("a").expect("a exists");

    assert_eq!(hierarchy.nodes().len() - 1, 4);
    assert_eq!(a.kind, EntryKind::Tree);
    let names: Vec<&str> = a.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["b.txt", "c"]);
    assert_eq!(hierarchy.find("a/c/d.txt").map(|n| n.kind), Some(EntryKind::Blob));
}

#[test]
fn drag_then_resize_keeps_arranged_subtree() {
    let mut session = TreeSession::new("repo", &sample_entries(), LayoutConfig::default());
    let before: Vec<(String, Point)> = session
        .layout()
        .subtree(session.layout().find("a").unwrap())
        .into_iter()
        .map(|slot| {
            let node = session.layout().node(slot);
            (node.path.clone(), node.position())
        })
        .collect();

    session
        .start_drag("a", Point::new(300.0, 200.0), PointerButton::Primary)
        .unwrap();
    session.move_drag(Point::new(350.0, 200.0)).unwrap();
    session.end_drag();
    session.resize(640.0, 480.0);

    for (path, old) in before {
        let now = session.layout().get(&path).unwrap().position();
        assert_eq!(now, Point::new(old.x + 50.0, old.y), "{path}");
    }
}

#[test]
fn deleting_subtree_purges_stored_positions() {
    let mut session = TreeSession::new("repo", &sample_entries(), LayoutConfig::default());
    session
        .start_drag("a/c", Point::new(0.0, 0.0), PointerButton::Primary)
        .unwrap();
    session.move_drag(Point::new(5.0, 5.0));
    session.end_drag();
    assert!(session.positions().contains("a/c/d.txt"));

    assert!(session.delete_node("a/c"));
    assert!(!session.positions().contains("a/c"));
    assert!(!session.positions().contains("a/c/d.txt"));
    let a = session.hierarchy().find("a").unwrap();
    assert_eq!(a.children.len(), 1);
    assert_eq!(a.children[0].name, "b.txt");

    assert!(!session.delete_node(""));
    assert_eq!(session.layout().len(), 3);
}

#[test]
fn partial_redraw_set_is_subtree_incoming_links() {
    let hierarchy = PathTreeBuilder::from_entries(
        "repo",
        &[
            PathEntry::blob("x/y/z.txt"),
            PathEntry::blob("x/y/w.txt"),
            PathEntry::blob("x/v.txt"),
            PathEntry::blob("u.txt"),
        ],
    );
    let layout = LayoutEngine::new(LayoutConfig::default()).run(&hierarchy, &PositionStore::new());
    let y = layout.find("x/y").unwrap();
    let mut targets: Vec<&str> = LinkRenderer::affected(&layout, y)
        .into_iter()
        .map(|link| layout.node(link.target).path.as_str())
        .collect();
    targets.sort();
    assert_eq!(targets, ["x/y", "x/y/w.txt", "x/y/z.txt"]);
}

#[test]
fn fixture_listing_renders_to_svg() -> Result<()> {
    let listing = include_str!("input/tree.json");
    let entries = parse_entries(listing)?;
    let mut session = TreeSession::new("sample", &entries, LayoutConfig::default());

    assert_eq!(session.layout().len(), 11);
    assert_eq!(session.search("rs"), 3);

    let svg = render_svg(&session, "white")?;
    assert!(svg.contains("<svg"), "rendered svg should contain root element");
    assert!(svg.contains("tidy.rs"), "node labels should appear in output");
    assert_eq!(svg.matches("class=\"blink\"").count(), 3);
    Ok(())
}

#[cfg(feature = "png")]
#[test]
fn render_png_has_png_header() -> Result<()> {
    let session = TreeSession::new("repo", &sample_entries(), LayoutConfig::with_size(400.0, 300.0));
    let png = oxtree::render::render_png(&session, "white", 1.0)?;

    const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
    assert!(
        png.starts_with(PNG_MAGIC),
        "rendered png should start with PNG header"
    );
    Ok(())
}
