pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS Crops (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS Runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT UNIQUE NOT NULL,
    date_time DATETIME DEFAULT CURRENT_TIMESTAMP,
    field_id INTEGER NOT NULL,
    crop_id INTEGER NOT NULL,
    FOREIGN KEY (field_id) REFERENCES Fields (id) ON DELETE CASCADE,
    FOREIGN KEY (crop_id) REFERENCES Crops (id)
);

CREATE TABLE IF NOT EXISTS Detections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    class INTEGER NOT NULL,
    FOREIGN KEY (run_id) REFERENCES Runs (run_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS ComparedRuns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    field_id INTEGER NOT NULL,
    run1 TEXT NOT NULL,
    run2 TEXT NOT NULL,
    UNIQUE (field_id, run1, run2),
    FOREIGN KEY (field_id) REFERENCES Fields (id) ON DELETE CASCADE,
    FOREIGN KEY (run1) REFERENCES Runs (run_id) ON DELETE CASCADE,
    FOREIGN KEY (run2) REFERENCES Runs (run_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS Comparison (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    compared_run_id INTEGER NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    category TEXT NOT NULL,
    FOREIGN KEY (compared_run_id) REFERENCES ComparedRuns (id) ON DELETE CASCADE
);
";
