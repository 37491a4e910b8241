#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tge {
    Pre,
    Post,
}

impl Tge {
    pub fn label(&self) -> &'static str {
        match self {
            Tge::Pre => "Pre-TGE",
            Tge::Post => "Post-TGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String, // topic id sent to the leaderboard API
    pub display_name: String,
    pub tge: Tge,
}

impl Project {
    /// A project outside the built-in catalog, addressed by its raw topic id.
    pub fn adhoc(topic_id: &str) -> Self {
        Self {
            name: topic_id.to_string(),
            display_name: topic_id.to_string(),
            tge: Tge::Pre,
        }
    }
}

const CATALOG: &[(&str, &str, Tge)] = &[
    ("MONAD", "Monad", Tge::Pre),
    ("MEGAETH", "MegaETH", Tge::Pre),
    ("SUCCINCT", "Succinct", Tge::Post),
    ("BOUNDLESS", "Boundless", Tge::Post),
    ("MITOSIS", "Mitosis", Tge::Post),
    ("CAMP", "Camp Network", Tge::Pre),
    ("SOMNIA", "Somnia", Tge::Post),
    ("ANOMA", "Anoma", Tge::Pre),
    ("ESPRESSO", "Espresso", Tge::Pre),
    ("CALDERA", "Caldera", Tge::Post),
    ("INFINEX", "Infinex", Tge::Pre),
    ("ZAMA", "Zama", Tge::Pre),
    ("INITIA", "Initia", Tge::Post),
    ("BERACHAIN", "Berachain", Tge::Post),
    ("SOPHON", "Sophon", Tge::Post),
    ("NOTED", "Noted", Tge::Pre),
];

pub fn projects() -> Vec<Project> {
    CATALOG
        .iter()
        .map(|(name, display_name, tge)| Project {
            name: name.to_string(),
            display_name: display_name.to_string(),
            tge: *tge,
        })
        .collect()
}

/// Case-insensitive substring filter on the topic id.
pub fn filter_projects<'a>(projects: &'a [Project], term: &str) -> Vec<&'a Project> {
    let term = term.to_lowercase();
    projects
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&term))
        .collect()
}

pub fn find_project(key: &str) -> Option<Project> {
    let key = key.to_lowercase();
    projects()
        .into_iter()
        .find(|p| p.name.to_lowercase() == key || p.display_name.to_lowercase() == key)
}
