error_chain! {
    errors {
        /// A cluster's configuration marks it as disabled.
        ///
        /// Callers are expected to downgrade this to a warning and skip the cluster.
        ClusterDisabled(id: String) {
            description("cluster is disabled")
            display("cluster '{}' is disabled", id)
        }

        /// A cluster's scheduler driver could not be constructed.
        ClusterConfig(id: String, reason: String) {
            description("cluster configuration is invalid")
            display("cluster '{}' configuration is invalid: {}", id, reason)
        }

        /// The requested driver type has no registered factory.
        InvalidDriver(kind: String) {
            description("driver type is not registered")
            display("driver type is not registered: {}", kind)
        }

        /// A driver parameter bag is missing a required key or has an unknown one.
        InvalidDriverParameters(reason: String) {
            description("driver parameters are invalid")
            display("driver parameters are invalid: {}", reason)
        }

        /// The application's constraint image name is not a valid regex anchor.
        ImageNameRegexpError(pattern: String, reason: String) {
            description("image name constraint is not a valid regular expression")
            display("image name constraint '{}' is not valid: {}", pattern, reason)
        }

        /// An application manager with this id is already registered.
        ManagerAlreadyExists(id: String) {
            description("application manager already exists")
            display("application manager already exists: {}", id)
        }

        /// A notifier with this id is already registered with the broadcaster.
        BroadcasterAlreadyExists(id: String) {
            description("notifier already registered with the broadcaster")
            display("notifier already registered with the broadcaster: {}", id)
        }

        /// The requested notifier type has no registered factory.
        InvalidNotification(kind: String) {
            description("notifier type is not registered")
            display("notifier type is not registered: {}", kind)
        }

        /// A notifier parameter bag is missing a required key or has an unknown one.
        InvalidNotifierParameters(reason: String) {
            description("notifier parameters are invalid")
            display("notifier parameters are invalid: {}", reason)
        }

        /// No clusters survived configuration (all disabled or invalid).
        NoClusters {
            description("no clusters configured")
            display("at least one enabled cluster is required")
        }
    }

    foreign_links {
        Io(::std::io::Error);
        YamlDecode(::serde_yaml::Error);
        Regex(::regex::Error);
        Http(::reqwest::Error);
    }
}
