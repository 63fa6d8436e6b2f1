//! Word tables backing the fake-value provider.

pub const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Alice", "Amara", "Amir", "Anita", "Arjun", "Barbara", "Carlos", "Chen",
    "Claude", "Dana", "Diego", "Dmitri", "Edsger", "Elena", "Emma", "Fatima", "Felix", "Grace",
    "Hana", "Henry", "Ines", "Ivan", "James", "Joan", "John", "Julia", "Kenji", "Lena",
    "Linus", "Liam", "Margaret", "Maria", "Mei", "Nadia", "Noah", "Olga", "Omar", "Priya",
    "Radia", "Rosa", "Sami", "Sofia", "Tariq", "Tim", "Vera", "Wei", "Yara", "Zoe",
];

pub const LAST_NAMES: &[&str] = &[
    "Anderson", "Bauer", "Bell", "Chen", "Costa", "Dijkstra", "Fernandez", "Fischer", "Garcia",
    "Gupta", "Haddad", "Hamilton", "Hopper", "Ibrahim", "Ito", "Jansen", "Johnson", "Kim",
    "Kowalski", "Kumar", "Larsson", "Lee", "Liskov", "Lovelace", "Martin", "Mbeki", "Miller",
    "Nakamura", "Nguyen", "Novak", "Okafor", "Park", "Patel", "Perlman", "Ritchie", "Rossi",
    "Sato", "Schmidt", "Silva", "Singh", "Smith", "Torres", "Turing", "Watanabe", "Weber",
    "Wilson", "Yamamoto", "Zhang",
];

pub const CITIES: &[&str] = &[
    "Amsterdam", "Austin", "Bangalore", "Barcelona", "Berlin", "Boston", "Buenos Aires",
    "Cairo", "Cape Town", "Chicago", "Copenhagen", "Dublin", "Helsinki", "Istanbul", "Jakarta",
    "Kyoto", "Lagos", "Lima", "Lisbon", "London", "Madrid", "Melbourne", "Mexico City",
    "Montreal", "Mumbai", "Nairobi", "Oslo", "Paris", "Prague", "Seoul", "Singapore",
    "Stockholm", "Sydney", "Taipei", "Tokyo", "Toronto", "Vienna", "Warsaw", "Zurich",
];

pub const COUNTRIES: &[&str] = &[
    "Argentina", "Australia", "Austria", "Belgium", "Brazil", "Canada", "Chile", "China",
    "Czechia", "Denmark", "Egypt", "Finland", "France", "Germany", "Ghana", "Greece", "India",
    "Indonesia", "Ireland", "Italy", "Japan", "Kenya", "Mexico", "Morocco", "Netherlands",
    "New Zealand", "Nigeria", "Norway", "Peru", "Poland", "Portugal", "Singapore",
    "South Africa", "South Korea", "Spain", "Sweden", "Switzerland", "Turkey",
    "United Kingdom", "United States", "Vietnam",
];

pub const STREET_SUFFIXES: &[&str] = &[
    "Avenue", "Boulevard", "Circle", "Court", "Drive", "Lane", "Place", "Road", "Square",
    "Street", "Terrace", "Way",
];

pub const EMAIL_DOMAINS: &[&str] = &[
    "example.com", "example.net", "example.org", "mail.test", "inbox.test", "post.test",
];

pub const SITE_TLDS: &[&str] = &["com", "net", "org", "io", "dev"];

pub const COMPANY_WORDS: &[&str] = &[
    "Apex", "Atlas", "Aurora", "Beacon", "Cascade", "Cobalt", "Delta", "Ember", "Harbor",
    "Helix", "Horizon", "Lumen", "Meridian", "Nimbus", "Northwind", "Orchard", "Pioneer",
    "Quartz", "Summit", "Vertex",
];

pub const COMPANY_SUFFIXES: &[&str] = &[
    "Analytics", "Dynamics", "Group", "Holdings", "Industries", "Labs", "Logistics",
    "Partners", "Systems", "Ventures",
];

pub const JOB_TITLES: &[&str] = &[
    "Accountant", "Architect", "Auditor", "Biologist", "Chemist", "Civil Engineer",
    "Data Analyst", "Dentist", "Designer", "Economist", "Editor", "Electrician",
    "Geologist", "Journalist", "Librarian", "Mechanical Engineer", "Nurse", "Paralegal",
    "Pharmacist", "Photographer", "Physicist", "Pilot", "Professor", "Software Engineer",
    "Statistician", "Surveyor", "Teacher", "Translator", "Veterinarian", "Web Developer",
];

pub const COLORS: &[&str] = &[
    "amber", "aqua", "beige", "black", "blue", "coral", "crimson", "cyan", "gold", "gray",
    "green", "indigo", "ivory", "lavender", "magenta", "maroon", "navy", "olive", "orange",
    "pink", "purple", "red", "salmon", "silver", "teal", "violet", "white", "yellow",
];

pub const WORDS: &[&str] = &[
    "ability", "account", "action", "balance", "basket", "branch", "bridge", "cabinet",
    "camera", "canvas", "carbon", "castle", "channel", "circle", "climate", "cluster",
    "compass", "concert", "copper", "cotton", "council", "current", "dawn", "desert",
    "drawer", "engine", "fabric", "factor", "forest", "fortune", "garden", "glacier",
    "granite", "harvest", "hollow", "island", "jungle", "kernel", "ladder", "lantern",
    "machine", "marble", "meadow", "mirror", "motion", "needle", "ocean", "orbit",
    "palace", "pattern", "pepper", "pillar", "planet", "prairie", "ribbon", "river",
    "saddle", "season", "shadow", "signal", "silver", "spiral", "spring", "stone",
    "summit", "thunder", "timber", "tunnel", "valley", "velvet", "violet", "window",
];
