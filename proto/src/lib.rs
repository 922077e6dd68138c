tonic::include_proto!("netshare.directory");
