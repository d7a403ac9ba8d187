//! Resource definitions
//!
//! Every administrative resource is the same soft-deletable, versioned record
//! stored in its own table. A [`ResourceDef`] binds the generic record to that
//! table's column names and to its parent resource.

/// Column bindings of one resource
#[derive(Debug, PartialEq, Eq)]
pub struct ResourceDef {
    /// Route segment and key of the nested parent object in JSON
    pub name: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
    /// Localized name columns (vn, en, jp)
    pub name_columns: &'static [&'static str],
    pub shortcut_column: &'static str,
    /// Parent resource; its id column doubles as this table's FK column
    pub parent: Option<&'static ResourceDef>,
}

pub static DEPARTMENT: ResourceDef = ResourceDef {
    name: "department",
    table: "tbl_department",
    id_column: "department_id",
    name_columns: &[
        "department_name_vn",
        "department_name_en",
        "department_name_jp",
    ],
    shortcut_column: "department_shortcut",
    parent: None,
};

pub static GROUP: ResourceDef = ResourceDef {
    name: "group",
    table: "tbl_group",
    id_column: "group_id",
    name_columns: &["group_name_vn", "group_name_en", "group_name_jp"],
    shortcut_column: "group_shortcut",
    parent: Some(&DEPARTMENT),
};

pub static TEAM: ResourceDef = ResourceDef {
    name: "team",
    table: "tbl_team",
    id_column: "team_id",
    name_columns: &["team_name_vn", "team_name_en", "team_name_jp"],
    shortcut_column: "team_shortcut",
    parent: Some(&GROUP),
};

pub static SHIFT: ResourceDef = ResourceDef {
    name: "shift",
    table: "tbl_shift",
    id_column: "shift_id",
    name_columns: &["shift_name_vn", "shift_name_en", "shift_name_jp"],
    shortcut_column: "shift_shortcut",
    parent: None,
};

/// All routed resources
pub static RESOURCES: [&ResourceDef; 4] = [&DEPARTMENT, &GROUP, &TEAM, &SHIFT];

impl ResourceDef {
    /// FK column pointing at the parent, if any
    pub fn parent_column(&self) -> Option<&'static str> {
        self.parent.map(|p| p.id_column)
    }

    /// Every stored column, in select order
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec![self.id_column];
        columns.extend(self.parent_column());
        columns.extend_from_slice(self.name_columns);
        columns.extend_from_slice(&[
            self.shortcut_column,
            "log_version",
            "created_by",
            "updated_by",
            "deleted_by",
            "created_at",
            "updated_at",
            "deleted_at",
        ]);
        columns
    }
}
