use super::*;

/// The built-in access control list.
///
/// Resources without their own table fall back to [`Resource::Default`].
pub fn default_rules() -> Acl {
    let library = || {
        RoleTable::new()
            .with(Role::Admin, GRANT_FULL_ACCESS)
            .with(Role::Viewer, GRANT_VIEW_LIBRARY)
            .with(Role::Visitor, GRANT_SEARCH_SHARED)
            .with(Role::Guest, GRANT_VIEW_SHARED)
            .with(Role::Client, GRANT_FULL_ACCESS)
    };
    let admin_and_clients = || {
        RoleTable::new()
            .with(Role::Admin, GRANT_FULL_ACCESS)
            .with(Role::Client, GRANT_FULL_ACCESS)
    };

    Acl::new()
        .with(Resource::Files, admin_and_clients())
        .with(Resource::Folders, admin_and_clients())
        .with(
            Resource::Shares,
            admin_and_clients().with(Role::Visitor, GRANT_REACT_SHARED),
        )
        .with(Resource::Photos, library())
        .with(Resource::Videos, library())
        .with(Resource::Albums, library().with(Role::Guest, GRANT_UPLOAD_SHARED))
        .with(
            Resource::Favorites,
            admin_and_clients().with(Role::Viewer, GRANT_VIEW_LIBRARY),
        )
        .with(
            Resource::Moments,
            admin_and_clients().with(Role::Viewer, GRANT_VIEW_LIBRARY),
        )
        .with(
            Resource::Calendar,
            admin_and_clients().with(Role::Viewer, GRANT_VIEW_LIBRARY),
        )
        .with(
            Resource::People,
            admin_and_clients().with(Role::Viewer, GRANT_VIEW_LIBRARY),
        )
        .with(Resource::Places, library())
        .with(
            Resource::Labels,
            admin_and_clients().with(Role::Viewer, GRANT_VIEW_LIBRARY),
        )
        .with(
            Resource::Config,
            RoleTable::new()
                .with(Role::Admin, GRANT_FULL_ACCESS)
                .with(Role::Client, GRANT_VIEW_OWN)
                .with(Role::Default, GRANT_VIEW_OWN),
        )
        .with(
            Resource::Settings,
            RoleTable::new()
                .with(Role::Admin, GRANT_FULL_ACCESS)
                .with(Role::Visitor, GRANT_VIEW_OWN)
                .with(Role::Client, GRANT_CONFIGURE_OWN)
                .with(Role::Default, GRANT_CONFIGURE_OWN),
        )
        .with(
            Resource::Passcode,
            RoleTable::new()
                .with(Role::Visitor, GRANT_NONE)
                .with(Role::Client, GRANT_NONE)
                .with(Role::Default, GRANT_CONFIGURE_OWN),
        )
        .with(
            Resource::Password,
            RoleTable::new()
                .with(Role::Visitor, GRANT_NONE)
                .with(Role::Client, GRANT_NONE)
                .with(Role::Default, GRANT_UPDATE_OWN),
        )
        .with(Resource::Services, admin_and_clients())
        .with(
            Resource::Users,
            RoleTable::new()
                .with(Role::Admin, GRANT_MANAGE_ACCOUNTS)
                .with(Role::Client, GRANT_MANAGE_ACCOUNTS)
                .with(Role::Visitor, GRANT_NONE)
                .with(Role::Default, GRANT_VIEW_OWN),
        )
        .with(
            Resource::Sessions,
            RoleTable::new()
                .with(Role::Admin, GRANT_FULL_ACCESS)
                .with(Role::Default, GRANT_MANAGE_OWN),
        )
        .with(
            Resource::Logs,
            admin_and_clients().with(Role::Default, GRANT_SUBSCRIBE_OWN),
        )
        .with(Resource::Api, admin_and_clients())
        .with(Resource::WebDav, admin_and_clients())
        .with(
            Resource::Metrics,
            RoleTable::new()
                .with(Role::Admin, GRANT_VIEW_ALL)
                .with(Role::Client, GRANT_VIEW_ALL),
        )
        .with(
            Resource::Vision,
            admin_and_clients().with(Role::Service, GRANT_FULL_ACCESS),
        )
        .with(
            Resource::Feedback,
            RoleTable::new().with(Role::Admin, GRANT_FULL_ACCESS),
        )
        .with(
            Resource::Cluster,
            RoleTable::new()
                .with(Role::Admin, GRANT_FULL_ACCESS)
                .with(Role::Portal, GRANT_FULL_ACCESS)
                .with(Role::Instance, GRANT_CONFIGURE_OWN)
                .with(Role::Service, GRANT_VIEW_OWN)
                .with(Role::Client, GRANT_VIEW_ALL),
        )
        .with(
            Resource::Default,
            admin_and_clients().with(Role::Default, GRANT_SUBSCRIBE_ALL),
        )
}
